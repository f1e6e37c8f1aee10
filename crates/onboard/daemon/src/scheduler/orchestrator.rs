//! Batch orchestrator: lease, claim, advance each record, release

use super::machine::{OnboardingMachine, RecordOutcome};
use super::selector::CandidateSelector;
use crate::collaborators::notice::Notifier;
use crate::collaborators::Collaborators;
use crate::config::{NotificationConfig, SchedulerConfig};
use crate::error::{DaemonError, DaemonResult, StorageError};
use crate::lease::LeaseManager;
use crate::storage::SupplierStorage;
use chrono::Utc;
use onboard_types::{SupplierId, SupplierRecord};
use std::sync::Arc;
use std::time::Duration;

/// Summary of one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// False when another holder had the lease and nothing ran
    pub acquired: bool,
    pub outcomes: Vec<RecordOutcome>,
    /// Records whose processing aborted on a storage or state error, or
    /// that were left claimed when the lease was lost
    pub failures: Vec<(SupplierId, String)>,
    /// The lease could not be renewed and the rest of the batch was dropped
    pub lease_lost: bool,
}

impl TickReport {
    fn skipped() -> Self {
        Self::default()
    }

    /// Records claimed this tick
    pub fn claimed(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }
}

pub struct Orchestrator {
    storage: Arc<dyn SupplierStorage>,
    leases: Arc<dyn LeaseManager>,
    selector: CandidateSelector,
    machine: OnboardingMachine,
    lock_key: String,
    lease_ttl: Duration,
    holder: String,
}

impl Orchestrator {
    pub fn new(
        storage: Arc<dyn SupplierStorage>,
        leases: Arc<dyn LeaseManager>,
        collaborators: Collaborators,
        scheduler: &SchedulerConfig,
        notifications: NotificationConfig,
    ) -> Self {
        let notifier = Notifier::new(collaborators.notifications.clone(), notifications);
        Self {
            selector: CandidateSelector::new(
                storage.clone(),
                Duration::from_secs(scheduler.stale_processing_secs),
            ),
            machine: OnboardingMachine::new(storage.clone(), collaborators, notifier),
            storage,
            leases,
            lock_key: scheduler.lock_key.clone(),
            lease_ttl: Duration::from_secs(scheduler.lease_ttl_secs),
            holder: format!("onboardd:{}", uuid::Uuid::new_v4()),
        }
    }

    /// Run one tick over at most `batch_size` records.
    ///
    /// Lease contention is a normal no-op, reported with `acquired == false`.
    pub async fn run_tick(&self, batch_size: usize) -> DaemonResult<TickReport> {
        let acquired = self
            .leases
            .try_acquire(&self.lock_key, &self.holder, self.lease_ttl)
            .await
            .map_err(|e| DaemonError::Lease(e.to_string()))?;
        if !acquired {
            tracing::info!(
                lock_key = %self.lock_key,
                holder = %self.holder,
                "Onboarding tick skipped, lease held elsewhere"
            );
            return Ok(TickReport::skipped());
        }

        let result = self.process_batch(batch_size).await;

        if let Err(e) = self.leases.release(&self.lock_key, &self.holder).await {
            tracing::warn!(
                lock_key = %self.lock_key,
                holder = %self.holder,
                error = %e,
                "Lease release failed; it will expire"
            );
        }
        result
    }

    /// Extend the lease before touching the next record
    async fn still_holds_lease(&self) -> bool {
        match self
            .leases
            .renew(&self.lock_key, &self.holder, self.lease_ttl)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(
                    lock_key = %self.lock_key,
                    holder = %self.holder,
                    "Lease lost mid-tick; dropping the rest of the batch"
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    lock_key = %self.lock_key,
                    holder = %self.holder,
                    error = %e,
                    "Lease renewal failed; dropping the rest of the batch"
                );
                false
            }
        }
    }

    async fn process_batch(&self, batch_size: usize) -> DaemonResult<TickReport> {
        let candidates = self.selector.claim(batch_size, Utc::now()).await?;
        let mut report = TickReport {
            acquired: true,
            ..Default::default()
        };

        let mut candidates = candidates.into_iter();
        while let Some(record) = candidates.next() {
            let id = record.id;
            if !self.still_holds_lease().await {
                report.lease_lost = true;
                // Still claimed; re-eligible once the claim goes stale
                for left in std::iter::once(id).chain(candidates.by_ref().map(|r| r.id)) {
                    report.failures.push((left, "lease lost before processing".to_string()));
                }
                break;
            }
            match self.machine.advance(record).await {
                Ok(outcome) => {
                    tracing::debug!(
                        supplier_id = %id,
                        previous = %outcome.previous,
                        state = %outcome.state,
                        contract = %outcome.contract_status,
                        "Record advanced"
                    );
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::error!(supplier_id = %id, error = %e, "Record processing aborted");
                    report.failures.push((id, e.to_string()));
                }
            }
        }

        if report.claimed() > 0 {
            tracing::info!(
                claimed = report.claimed(),
                failures = report.failures.len(),
                lease_lost = report.lease_lost,
                "Onboarding tick finished"
            );
        }
        Ok(report)
    }

    /// Operator requeue: an `Error` record, or a `Ready` record whose
    /// contract failed or never went out, goes back to `Unset`
    pub async fn requeue(&self, id: SupplierId) -> DaemonResult<SupplierRecord> {
        let mut record = self
            .storage
            .get_supplier(id)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        record.requeue()?;
        self.storage.save_supplier(&record).await?;

        tracing::info!(supplier_id = %id, "Record requeued");
        Ok(record)
    }
}
