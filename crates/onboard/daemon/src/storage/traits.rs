//! Storage trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onboard_types::{StateCode, SupplierId, SupplierRecord};

/// Storage for supplier records
#[async_trait]
pub trait SupplierStorage: Send + Sync {
    /// Get a record by ID
    async fn get_supplier(&self, id: SupplierId) -> StorageResult<Option<SupplierRecord>>;

    /// List all records in id order
    async fn list_suppliers(&self) -> StorageResult<Vec<SupplierRecord>>;

    /// Create or update a record
    async fn save_supplier(&self, record: &SupplierRecord) -> StorageResult<()>;

    /// Select up to `limit` candidates in ascending id order and mark them
    /// `Processing` in one commit.
    ///
    /// Candidates are `Unset`, `AwaitingMembership`, `ApprovedExternally`
    /// with credentials, and `Processing` or in-flight `Ready` claims taken
    /// before `stale_before`.
    async fn claim_candidates(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<SupplierRecord>>;
}

/// Whether a record is eligible for the next tick
pub fn is_candidate(record: &SupplierRecord, stale_before: DateTime<Utc>) -> bool {
    match record.state() {
        StateCode::Unset | StateCode::AwaitingMembership => true,
        StateCode::ApprovedExternally => record.has_credentials(),
        StateCode::Processing => record.claimed_at.map_or(true, |at| at < stale_before),
        // A tick died after committing an intermediate `Ready`
        StateCode::Ready => record.claimed_at.is_some_and(|at| at < stale_before),
        StateCode::Error | StateCode::Skipped => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: i64) -> SupplierRecord {
        SupplierRecord::new(SupplierId::new(id), "Acme", "ops@acme.test")
    }

    #[test]
    fn test_unset_is_candidate() {
        assert!(is_candidate(&record(1), Utc::now()));
    }

    #[test]
    fn test_approved_requires_credentials() {
        let now = Utc::now();
        assert!(!is_candidate(&record(1).approved_externally(), now));
        assert!(is_candidate(
            &record(1).with_credentials("acme01", None).approved_externally(),
            now
        ));
    }

    #[test]
    fn test_fresh_processing_is_not_candidate() {
        let now = Utc::now();
        let mut rec = record(1);
        rec.claim(now).unwrap();
        assert!(!is_candidate(&rec, now - Duration::seconds(900)));
        assert!(is_candidate(&rec, now + Duration::seconds(1)));
    }

    #[test]
    fn test_ready_is_candidate_only_while_stale_claim_remains() {
        let now = Utc::now();
        let mut rec = record(1);
        rec.claim(now - Duration::hours(1)).unwrap();
        rec.transition(StateCode::Ready).unwrap();
        assert!(is_candidate(&rec, now - Duration::seconds(900)));
        assert!(!is_candidate(&rec, now - Duration::hours(2)));

        rec.release_claim();
        assert!(!is_candidate(&rec, now));
    }
}
