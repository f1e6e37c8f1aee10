//! Named leases serializing onboarding ticks
//!
//! A lease is a lock with an expiry: a holder that dies without releasing
//! only blocks other ticks until `expires_at`.

mod memory;
mod postgres;

pub use memory::InMemoryLeaseManager;
pub use postgres::PostgresLeaseManager;

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Non-blocking lease acquisition
#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Take `key` for `holder` unless a live lease exists (held by anyone,
    /// including `holder`). Returns `false` on contention.
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool>;

    /// Push the expiry of a lease `holder` still owns to `now + ttl`.
    /// Returns `false` once the lease was taken over or released.
    async fn renew(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool>;

    /// Drop `key` if `holder` still owns it
    async fn release(&self, key: &str, holder: &str) -> StorageResult<()>;
}

pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
