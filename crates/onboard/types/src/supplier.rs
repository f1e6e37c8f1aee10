//! Supplier records and their onboarding state

use crate::contract::ContractTemplate;
use crate::ids::{ChannelRef, DocumentRef, SupplierId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Onboarding state of a supplier record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateCode {
    /// Created by the registration flow, never processed
    #[default]
    Unset,
    /// Claimed by a tick
    Processing,
    /// Channel and membership satisfied (or not needed yet)
    Ready,
    /// Sign-up invite e-mail sent, waiting for the contact to join
    AwaitingMembership,
    /// Needs operator attention
    Error,
    /// Contract executed outside the system
    Skipped,
    /// Approved by the registration flow (secondary intake path)
    ApprovedExternally,
}

/// Persisted code did not match any known state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} code: {code}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: String,
}

impl StateCode {
    /// Storage code; `None` is the unset state
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Processing => Some("P"),
            Self::Ready => Some("A"),
            Self::AwaitingMembership => Some("I"),
            Self::Error => Some("E"),
            Self::Skipped => Some("S"),
            Self::ApprovedExternally => Some("RA"),
        }
    }

    pub fn from_code(code: Option<&str>) -> Result<Self, UnknownCode> {
        match code.map(str::trim) {
            None | Some("") => Ok(Self::Unset),
            Some("P") => Ok(Self::Processing),
            Some("A") => Ok(Self::Ready),
            Some("I") => Ok(Self::AwaitingMembership),
            Some("E") => Ok(Self::Error),
            Some("S") => Ok(Self::Skipped),
            Some("RA") => Ok(Self::ApprovedExternally),
            Some(other) => Err(UnknownCode {
                kind: "state",
                code: other.to_string(),
            }),
        }
    }

    /// Whether `self -> to` is an edge of the onboarding graph
    pub fn can_transition_to(&self, to: StateCode) -> bool {
        use StateCode::*;
        matches!(
            (self, to),
            (Unset | AwaitingMembership | ApprovedExternally | Ready, Processing)
                | (Processing, Processing | Ready | AwaitingMembership | Error)
                | (Ready, AwaitingMembership | Ready | Skipped | Error)
                | (Error | Ready, Unset)
        )
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::AwaitingMembership => "awaiting_membership",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::ApprovedExternally => "approved_externally",
        };
        f.write_str(name)
    }
}

/// Contract dispatch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContractStatus {
    #[default]
    Unset,
    /// Dispatch started; not retried automatically
    Pending,
    Sent,
    Error,
    /// Signed outside the system
    Skipped,
}

impl ContractStatus {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Pending => Some("P"),
            Self::Sent => Some("A"),
            Self::Error => Some("E"),
            Self::Skipped => Some("S"),
        }
    }

    pub fn from_code(code: Option<&str>) -> Result<Self, UnknownCode> {
        match code.map(str::trim) {
            None | Some("") => Ok(Self::Unset),
            Some("P") => Ok(Self::Pending),
            Some("A") => Ok(Self::Sent),
            Some("E") => Ok(Self::Error),
            Some("S") => Ok(Self::Skipped),
            Some(other) => Err(UnknownCode {
                kind: "contract status",
                code: other.to_string(),
            }),
        }
    }

    /// Statuses the contract step may (re)dispatch from
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Unset | Self::Error)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Error => "error",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Commerce-portal login issued to the supplier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCredentials {
    pub login_id: String,
    pub temporary_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal state transition for {id}: {from} -> {to}")]
pub struct IllegalTransition {
    pub id: SupplierId,
    pub from: StateCode,
    pub to: StateCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("channel for {id} is already set to {existing}")]
pub struct ChannelAlreadyAssigned {
    pub id: SupplierId,
    pub existing: ChannelRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractStatusError {
    #[error("contract for {0} was executed externally and cannot be marked sent")]
    SkippedContract(SupplierId),

    #[error("contract for {id} cannot move from {from} to {to}")]
    Illegal {
        id: SupplierId,
        from: ContractStatus,
        to: ContractStatus,
    },
}

/// One onboarding subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: SupplierId,
    pub company_name: String,
    pub contact_email: String,
    channel_ref: Option<ChannelRef>,
    state: StateCode,
    /// State held before the current `Processing` claim
    pub claimed_from: Option<StateCode>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub credentials: Option<SupplierCredentials>,
    pub contract_template: ContractTemplate,
    pub contract_skipped: bool,
    contract_status: ContractStatus,
    contract_document_ref: Option<DocumentRef>,
    pub updated_at: DateTime<Utc>,
}

impl SupplierRecord {
    /// A freshly registered supplier
    pub fn new(id: SupplierId, company_name: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            id,
            company_name: company_name.into(),
            contact_email: contact_email.into(),
            channel_ref: None,
            state: StateCode::Unset,
            claimed_from: None,
            claimed_at: None,
            last_error: None,
            credentials: None,
            contract_template: ContractTemplate::None,
            contract_skipped: false,
            contract_status: ContractStatus::Unset,
            contract_document_ref: None,
            updated_at: Utc::now(),
        }
    }

    /// Rebuild a record from persisted columns without graph checks
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: SupplierId,
        company_name: String,
        contact_email: String,
        channel_ref: Option<ChannelRef>,
        state: StateCode,
        contract_status: ContractStatus,
        contract_document_ref: Option<DocumentRef>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_ref,
            state,
            contract_status,
            contract_document_ref,
            updated_at,
            ..Self::new(id, company_name, contact_email)
        }
    }

    pub fn with_template(mut self, template: ContractTemplate) -> Self {
        self.contract_template = template;
        self
    }

    pub fn with_credentials(mut self, login_id: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some(SupplierCredentials {
            login_id: login_id.into(),
            temporary_password: password,
        });
        self
    }

    pub fn with_contract_skipped(mut self, skipped: bool) -> Self {
        self.contract_skipped = skipped;
        self
    }

    /// Registration flow approval; only valid for a record never processed
    pub fn approved_externally(mut self) -> Self {
        if self.state == StateCode::Unset {
            self.state = StateCode::ApprovedExternally;
        }
        self
    }

    pub fn state(&self) -> StateCode {
        self.state
    }

    pub fn channel_ref(&self) -> Option<&ChannelRef> {
        self.channel_ref.as_ref()
    }

    pub fn contract_status(&self) -> ContractStatus {
        self.contract_status
    }

    pub fn contract_document_ref(&self) -> Option<&DocumentRef> {
        self.contract_document_ref.as_ref()
    }

    pub fn company_name(&self) -> Option<&str> {
        non_blank(&self.company_name)
    }

    pub fn contact_email(&self) -> Option<&str> {
        non_blank(&self.contact_email)
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| !c.login_id.trim().is_empty())
    }

    /// Move along an edge of the onboarding graph
    pub fn transition(&mut self, to: StateCode) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(to) {
            return Err(IllegalTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        // A claim lives on through `Ready` until the tick releases it
        if !matches!(to, StateCode::Processing | StateCode::Ready) {
            self.claimed_at = None;
        }
        if to != StateCode::Error && to != StateCode::Processing {
            self.last_error = None;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Take a `Processing` claim; re-taking a stale claim keeps its
    /// original origin
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        let from = self.state;
        let in_flight = self.is_claimed();
        self.transition(StateCode::Processing)?;
        if !in_flight {
            self.claimed_from = Some(from);
        }
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Claimed by a tick that has not finished with the record
    pub fn is_claimed(&self) -> bool {
        self.state == StateCode::Processing || self.claimed_at.is_some()
    }

    /// End of the tick's work on this record
    pub fn release_claim(&mut self) {
        if self.claimed_at.take().is_some() {
            self.updated_at = Utc::now();
        }
    }

    /// State before the current claim (the invite guard keys on this)
    pub fn previous_state(&self) -> StateCode {
        self.claimed_from.unwrap_or(StateCode::Unset)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), IllegalTransition> {
        self.transition(StateCode::Error)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Write-once channel assignment
    pub fn assign_channel(&mut self, channel: ChannelRef) -> Result<(), ChannelAlreadyAssigned> {
        if let Some(existing) = &self.channel_ref {
            return Err(ChannelAlreadyAssigned {
                id: self.id,
                existing: existing.clone(),
            });
        }
        self.channel_ref = Some(channel);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_contract_status(&mut self, to: ContractStatus) -> Result<(), ContractStatusError> {
        use ContractStatus::*;
        if to == Sent && self.contract_skipped {
            return Err(ContractStatusError::SkippedContract(self.id));
        }
        let allowed = match (self.contract_status, to) {
            (Unset | Error, Pending | Skipped | Error) => true,
            (Pending, Sent | Error) => true,
            _ => false,
        };
        if !allowed {
            return Err(ContractStatusError::Illegal {
                id: self.id,
                from: self.contract_status,
                to,
            });
        }
        self.contract_status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a successful dispatch
    pub fn mark_contract_sent(&mut self, document: DocumentRef) -> Result<(), ContractStatusError> {
        self.set_contract_status(ContractStatus::Sent)?;
        self.contract_document_ref = Some(document);
        Ok(())
    }

    /// Operator requeue back to `Unset`: `Error`, or `Ready` whose contract
    /// is unsent, failed or stuck `Pending`. A `Pending` contract becomes
    /// `Error` so the next tick dispatches it again.
    pub fn requeue(&mut self) -> Result<(), IllegalTransition> {
        let eligible = match self.state {
            StateCode::Error => true,
            StateCode::Ready => matches!(
                self.contract_status,
                ContractStatus::Unset | ContractStatus::Pending | ContractStatus::Error
            ),
            _ => false,
        };
        if !eligible {
            return Err(IllegalTransition {
                id: self.id,
                from: self.state,
                to: StateCode::Unset,
            });
        }
        self.transition(StateCode::Unset)?;
        if self.contract_status == ContractStatus::Pending {
            self.contract_status = ContractStatus::Error;
        }
        self.claimed_from = None;
        self.last_error = None;
        Ok(())
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
