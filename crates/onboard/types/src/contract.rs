//! Contract templates and the commission tier calculator
//!
//! Percent values are exact decimals (the store keeps two fractional digits).
//! Amounts are whole currency units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commission scheme a supplier signs up for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractTemplate {
    /// No template selected yet
    #[default]
    None,

    /// Single percentage of the gross amount
    FlatRate { percent: Decimal },

    /// `percent_under` up to and including the threshold, `percent_over` on
    /// the excess only
    Tiered {
        threshold_amount: i64,
        percent_under: Decimal,
        percent_over: Decimal,
    },
}

/// Reasons a template cannot be dispatched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractValidationError {
    #[error("no contract template selected")]
    NotSelected,

    #[error("flat-rate contract: commission percent {0} is outside 0..=100")]
    FlatPercentOutOfRange(Decimal),

    #[error("tiered contract: threshold amount {0} must not be negative")]
    NegativeThreshold(i64),

    #[error("tiered contract: {side} percent {value} is outside 0..=100")]
    TieredPercentOutOfRange { side: &'static str, value: Decimal },
}

impl ContractTemplate {
    pub fn flat_rate(percent: Decimal) -> Self {
        Self::FlatRate { percent }
    }

    pub fn tiered(threshold_amount: i64, percent_under: Decimal, percent_over: Decimal) -> Self {
        Self::Tiered {
            threshold_amount,
            percent_under,
            percent_over,
        }
    }

    pub fn is_selected(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Check the parameters before anything is sent to the e-signature platform
    pub fn validate(&self) -> Result<(), ContractValidationError> {
        match self {
            Self::None => Err(ContractValidationError::NotSelected),
            Self::FlatRate { percent } => {
                if in_percent_range(*percent) {
                    Ok(())
                } else {
                    Err(ContractValidationError::FlatPercentOutOfRange(*percent))
                }
            }
            Self::Tiered {
                threshold_amount,
                percent_under,
                percent_over,
            } => {
                if *threshold_amount < 0 {
                    return Err(ContractValidationError::NegativeThreshold(*threshold_amount));
                }
                if !in_percent_range(*percent_under) {
                    return Err(ContractValidationError::TieredPercentOutOfRange {
                        side: "under-threshold",
                        value: *percent_under,
                    });
                }
                if !in_percent_range(*percent_over) {
                    return Err(ContractValidationError::TieredPercentOutOfRange {
                        side: "over-threshold",
                        value: *percent_over,
                    });
                }
                Ok(())
            }
        }
    }
}

fn in_percent_range(percent: Decimal) -> bool {
    percent >= Decimal::ZERO && percent <= Decimal::ONE_HUNDRED
}

/// Commission owed on `gross_amount` under `template`.
///
/// Each tier is rounded half-up on its own; the threshold amount itself is
/// always charged at the under-threshold rate. An unselected template owes
/// nothing. Results outside `i64` saturate.
pub fn commission(gross_amount: i64, template: &ContractTemplate) -> i64 {
    match template {
        ContractTemplate::None => 0,
        ContractTemplate::FlatRate { percent } => percent_of(Decimal::from(gross_amount), *percent),
        ContractTemplate::Tiered {
            threshold_amount,
            percent_under,
            percent_over,
        } => {
            if gross_amount <= *threshold_amount {
                percent_of(Decimal::from(gross_amount), *percent_under)
            } else {
                let under = percent_of(Decimal::from(*threshold_amount), *percent_under);
                let excess = Decimal::from(gross_amount) - Decimal::from(*threshold_amount);
                under.saturating_add(percent_of(excess, *percent_over))
            }
        }
    }
}

fn percent_of(amount: Decimal, percent: Decimal) -> i64 {
    let Some(product) = amount.checked_mul(percent) else {
        return saturate(amount.is_sign_negative() != percent.is_sign_negative());
    };
    let rounded = (product / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .to_i64()
        .unwrap_or_else(|| saturate(rounded.is_sign_negative()))
}

fn saturate(negative: bool) -> i64 {
    if negative {
        i64::MIN
    } else {
        i64::MAX
    }
}

/// Settlement figures derived from a period's sales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub gross_amount: i64,
    pub commission_amount: i64,
    pub shipping_amount: i64,
    /// gross - commission + shipping
    pub final_amount: i64,
}

pub fn settlement_summary(
    gross_amount: i64,
    shipping_amount: i64,
    template: &ContractTemplate,
) -> SettlementSummary {
    let commission_amount = commission(gross_amount, template);
    SettlementSummary {
        gross_amount,
        commission_amount,
        shipping_amount,
        final_amount: gross_amount
            .saturating_sub(commission_amount)
            .saturating_add(shipping_amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_flat_rate_commission() {
        let template = ContractTemplate::flat_rate(pct(15));
        assert_eq!(commission(2_000_000, &template), 300_000);
    }

    #[test]
    fn test_flat_rate_rounds_half_up() {
        let template = ContractTemplate::flat_rate(pct(10));
        assert_eq!(commission(5, &template), 1);
        assert_eq!(commission(4, &template), 0);

        // 12.5% of 3 = 0.375
        let template = ContractTemplate::flat_rate(Decimal::new(1250, 2));
        assert_eq!(commission(3, &template), 0);
        assert_eq!(commission(4, &template), 1);
    }

    #[test]
    fn test_tiered_boundary_uses_under_rate() {
        let tiered = ContractTemplate::tiered(10_000_000, pct(10), pct(20));
        let flat = ContractTemplate::flat_rate(pct(10));
        assert_eq!(commission(10_000_000, &tiered), commission(10_000_000, &flat));
        assert_eq!(commission(10_000_000, &tiered), 1_000_000);
    }

    #[test]
    fn test_tiered_marginal_split() {
        let tiered = ContractTemplate::tiered(10_000_000, pct(10), pct(20));
        assert_eq!(commission(15_000_000, &tiered), 2_000_000);
    }

    #[test]
    fn test_tiered_below_threshold() {
        let tiered = ContractTemplate::tiered(10_000_000, pct(10), pct(20));
        assert_eq!(commission(3_000_000, &tiered), 300_000);
    }

    #[test]
    fn test_no_template_owes_nothing() {
        assert_eq!(commission(1_000_000, &ContractTemplate::None), 0);
    }

    #[test]
    fn test_out_of_range_percent_saturates_instead_of_panicking() {
        let template = ContractTemplate::flat_rate(Decimal::MAX);
        assert_eq!(commission(i64::MAX, &template), i64::MAX);
    }

    #[test]
    fn test_validate_flat_rate() {
        assert!(ContractTemplate::flat_rate(pct(0)).validate().is_ok());
        assert!(ContractTemplate::flat_rate(pct(100)).validate().is_ok());
        assert_eq!(
            ContractTemplate::flat_rate(pct(150)).validate(),
            Err(ContractValidationError::FlatPercentOutOfRange(pct(150)))
        );
        assert!(ContractTemplate::flat_rate(pct(-1)).validate().is_err());
    }

    #[test]
    fn test_validate_tiered() {
        assert!(ContractTemplate::tiered(0, pct(5), pct(7)).validate().is_ok());
        assert_eq!(
            ContractTemplate::tiered(-1, pct(5), pct(7)).validate(),
            Err(ContractValidationError::NegativeThreshold(-1))
        );
        let err = ContractTemplate::tiered(100, pct(5), pct(101))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("over-threshold"));
    }

    #[test]
    fn test_validate_none() {
        assert_eq!(
            ContractTemplate::None.validate(),
            Err(ContractValidationError::NotSelected)
        );
    }

    #[test]
    fn test_settlement_summary() {
        let summary = settlement_summary(
            1_000_000,
            30_000,
            &ContractTemplate::flat_rate(pct(10)),
        );
        assert_eq!(summary.commission_amount, 100_000);
        assert_eq!(summary.final_amount, 930_000);
    }

    #[test]
    fn test_template_serde_tagging() {
        let template = ContractTemplate::tiered(10, pct(1), pct(2));
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["kind"], "tiered");
        let back: ContractTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }
}
