//! Per-record onboarding state machine
//!
//! Steps run in order (channel, membership, contract, finalize) and every
//! state change is committed before the next collaborator call, so a failure
//! part-way through leaves the record at the last completed step.

use crate::collaborators::notice::{self, Notifier};
use crate::collaborators::{Collaborators, InviteOutcome};
use crate::error::DaemonResult;
use crate::storage::SupplierStorage;
use chrono::Utc;
use onboard_types::{ContractStatus, StateCode, SupplierId, SupplierRecord};
use std::sync::Arc;

/// Where a record ended up after one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub id: SupplierId,
    /// State held before the claim
    pub previous: StateCode,
    pub state: StateCode,
    pub contract_status: ContractStatus,
}

impl RecordOutcome {
    fn of(record: &SupplierRecord, previous: StateCode) -> Self {
        Self {
            id: record.id,
            previous,
            state: record.state(),
            contract_status: record.contract_status(),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Why a claimed record cannot be processed at all
fn precondition_failure(record: &SupplierRecord) -> Option<&'static str> {
    if record.contact_email().is_none() {
        return Some("contact e-mail is missing");
    }
    if record.channel_ref().is_none() && record.company_name().is_none() {
        return Some("company name is missing; cannot name a channel");
    }
    None
}

pub struct OnboardingMachine {
    storage: Arc<dyn SupplierStorage>,
    collaborators: Collaborators,
    notifier: Notifier,
}

impl OnboardingMachine {
    pub fn new(
        storage: Arc<dyn SupplierStorage>,
        collaborators: Collaborators,
        notifier: Notifier,
    ) -> Self {
        Self {
            storage,
            collaborators,
            notifier,
        }
    }

    /// Advance one claimed (`Processing`) record as far as its
    /// preconditions allow this tick, then release the claim
    pub async fn advance(&self, mut record: SupplierRecord) -> DaemonResult<RecordOutcome> {
        let previous = record.previous_state();

        self.run_steps(&mut record, previous).await?;

        if record.claimed_at.is_some() {
            record.release_claim();
            self.commit(&record).await?;
        }
        Ok(RecordOutcome::of(&record, previous))
    }

    async fn run_steps(&self, record: &mut SupplierRecord, previous: StateCode) -> DaemonResult<()> {
        if let Some(reason) = precondition_failure(record) {
            return self.fail(record, reason.to_string()).await;
        }

        if let Flow::Stop = self.channel_step(record).await? {
            return Ok(());
        }

        if let Flow::Stop = self.membership_step(record, previous).await? {
            return Ok(());
        }

        if record.channel_ref().is_some()
            && record.contract_status().is_dispatchable()
            && record.contact_email().is_some()
        {
            self.contract_step(record).await?;
        } else if record.contract_status() == ContractStatus::Pending {
            // A crashed tick may or may not have created the document
            tracing::warn!(
                supplier_id = %record.id,
                "Contract dispatch was interrupted; leaving it pending for operator requeue"
            );
        }

        if record.state() == StateCode::Processing {
            record.transition(StateCode::Ready)?;
            self.commit(record).await?;
        }
        Ok(())
    }

    async fn channel_step(&self, record: &mut SupplierRecord) -> DaemonResult<Flow> {
        if record.channel_ref().is_some() {
            return Ok(Flow::Continue);
        }
        let company = record.company_name().unwrap_or_default().to_string();

        match self.collaborators.channels.create_channel(&company).await {
            Ok(channel) => {
                record.assign_channel(channel.clone())?;
                record.transition(StateCode::Ready)?;
                self.commit(record).await?;

                tracing::info!(supplier_id = %record.id, channel = %channel, "Channel provisioned");
                let email = record.contact_email().unwrap_or_default();
                self.notifier
                    .both(
                        Some(&channel),
                        &notice::channel_created(&company, email, &channel),
                    )
                    .await;
                Ok(Flow::Continue)
            }
            Err(e) => {
                self.fail(record, format!("channel creation failed: {}", e)).await?;
                Ok(Flow::Stop)
            }
        }
    }

    async fn membership_step(
        &self,
        record: &mut SupplierRecord,
        previous: StateCode,
    ) -> DaemonResult<Flow> {
        let Some(email) = record.contact_email().map(str::to_string) else {
            return Ok(Flow::Continue);
        };
        let company = record.company_name().unwrap_or_default().to_string();

        let user = match self.collaborators.membership.lookup(&email).await {
            Ok(user) => user,
            Err(e) => {
                self.fail(record, format!("membership lookup failed: {}", e)).await?;
                return Ok(Flow::Stop);
            }
        };

        let Some(user) = user else {
            if previous == StateCode::AwaitingMembership {
                // Invite went out on an earlier tick; never resend it
                record.transition(StateCode::AwaitingMembership)?;
                self.commit(record).await?;
                tracing::debug!(supplier_id = %record.id, "Still waiting for workspace sign-up");
                return Ok(Flow::Stop);
            }

            if let Err(e) = self.collaborators.mailer.send_join_invite(&email, &company).await {
                self.fail(record, format!("join invite failed: {}", e)).await?;
                return Ok(Flow::Stop);
            }
            record.transition(StateCode::AwaitingMembership)?;
            self.commit(record).await?;

            tracing::info!(supplier_id = %record.id, "Join invite sent");
            self.notifier
                .both(
                    record.channel_ref(),
                    &notice::join_invite_sent(&company, &email, Utc::now()),
                )
                .await;
            return Ok(Flow::Stop);
        };

        let Some(channel) = record.channel_ref().cloned() else {
            self.fail(record, "no channel to invite the member into".to_string())
                .await?;
            return Ok(Flow::Stop);
        };

        match self.collaborators.membership.invite(&channel, &user).await {
            Ok(outcome) => {
                record.transition(StateCode::Ready)?;
                self.commit(record).await?;

                tracing::info!(
                    supplier_id = %record.id,
                    user = %user,
                    already_member = outcome == InviteOutcome::AlreadyMember,
                    "Member added to channel"
                );
                self.notifier
                    .both(Some(&channel), &notice::user_joined(&company, &user, Utc::now()))
                    .await;
                Ok(Flow::Continue)
            }
            Err(e) => {
                self.fail(record, format!("channel invite failed: {}", e)).await?;
                Ok(Flow::Stop)
            }
        }
    }

    async fn contract_step(&self, record: &mut SupplierRecord) -> DaemonResult<()> {
        let company = record.company_name().unwrap_or_default().to_string();
        let email = record.contact_email().unwrap_or_default().to_string();
        let channel = record.channel_ref().cloned();

        if record.contract_skipped {
            record.set_contract_status(ContractStatus::Skipped)?;
            record.transition(StateCode::Skipped)?;
            self.commit(record).await?;

            tracing::info!(supplier_id = %record.id, "Contract executed externally; dispatch skipped");
            self.notifier
                .both(channel.as_ref(), &notice::contract_skipped(&company))
                .await;
            let tip = notice::credentials_tip(
                &company,
                record.credentials.as_ref(),
                self.notifier.config(),
            );
            self.notifier.supplier(channel.as_ref(), &tip).await;
            return Ok(());
        }

        if let Err(e) = record.contract_template.validate() {
            self.contract_failed(record, &company, &email, e.to_string())
                .await?;
            return Ok(());
        }

        record.set_contract_status(ContractStatus::Pending)?;
        self.commit(record).await?;

        let recipient_name = if company.is_empty() {
            "Supplier contact".to_string()
        } else {
            company.clone()
        };
        let contracts = &self.collaborators.contracts;
        let dispatched = match contracts.issue_token().await {
            Ok(token) => {
                contracts
                    .create_document(&token, &record.contract_template, &email, &recipient_name)
                    .await
            }
            Err(e) => Err(e),
        };

        match dispatched {
            Ok(document) => {
                record.mark_contract_sent(document.clone())?;
                self.commit(record).await?;

                tracing::info!(supplier_id = %record.id, document = %document, "Contract sent");
                self.notifier
                    .both(
                        channel.as_ref(),
                        &notice::contract_sent(&company, &email, Utc::now()),
                    )
                    .await;
            }
            Err(e) => {
                self.contract_failed(record, &company, &email, e.to_string())
                    .await?;
            }
        }
        Ok(())
    }

    async fn contract_failed(
        &self,
        record: &mut SupplierRecord,
        company: &str,
        email: &str,
        reason: String,
    ) -> DaemonResult<()> {
        tracing::warn!(supplier_id = %record.id, reason = %reason, "Contract not sent");
        record.set_contract_status(ContractStatus::Error)?;
        record.last_error = Some(reason.clone());
        self.commit(record).await?;

        self.notifier
            .broadcast(&notice::contract_failed(company, email, &reason, Utc::now()))
            .await;
        Ok(())
    }

    async fn fail(&self, record: &mut SupplierRecord, reason: String) -> DaemonResult<()> {
        tracing::warn!(supplier_id = %record.id, reason = %reason, "Onboarding step failed");
        record.fail(reason)?;
        self.commit(record).await
    }

    async fn commit(&self, record: &SupplierRecord) -> DaemonResult<()> {
        self.storage.save_supplier(record).await?;
        Ok(())
    }
}
