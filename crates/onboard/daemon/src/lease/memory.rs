//! In-process lease manager

use super::{expiry, LeaseManager};
use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// Lease manager for a single process (development and tests)
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseManager {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl InMemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of a live lease
    pub async fn holder(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock().await;
        leases
            .get(key)
            .filter(|l| l.expires_at > Utc::now())
            .map(|l| l.holder.clone())
    }
}

#[async_trait]
impl LeaseManager for InMemoryLeaseManager {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let mut leases = self.leases.lock().await;
        let now = Utc::now();

        if let Some(existing) = leases.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
            tracing::info!(
                key = key,
                previous_holder = %existing.holder,
                "Taking over expired lease"
            );
        }

        leases.insert(
            key.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: expiry(now, ttl),
            },
        );
        Ok(true)
    }

    async fn renew(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get_mut(key) {
            Some(lease) if lease.holder == holder => {
                lease.expires_at = expiry(Utc::now(), ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str, holder: &str) -> StorageResult<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(key).is_some_and(|l| l.holder == holder) {
            leases.remove(key);
        }
        Ok(())
    }
}
