//! Candidate selection for a tick

use crate::error::StorageResult;
use crate::storage::SupplierStorage;
use chrono::{DateTime, Utc};
use onboard_types::SupplierRecord;
use std::sync::Arc;
use std::time::Duration;

/// Claims the next batch of eligible records
#[derive(Clone)]
pub struct CandidateSelector {
    storage: Arc<dyn SupplierStorage>,
    stale_after: chrono::Duration,
}

impl CandidateSelector {
    pub fn new(storage: Arc<dyn SupplierStorage>, stale_after: Duration) -> Self {
        Self {
            storage,
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    /// Oldest eligible records first, at most `batch_size`, already marked
    /// `Processing` when returned
    pub async fn claim(
        &self,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<SupplierRecord>> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let stale_before = now
            .checked_sub_signed(self.stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let claimed = self
            .storage
            .claim_candidates(batch_size, stale_before, now)
            .await?;

        tracing::debug!(batch_size = batch_size, claimed = claimed.len(), "Claimed candidates");
        Ok(claimed)
    }
}
