//! In-memory storage implementation

use super::traits::*;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onboard_types::{SupplierId, SupplierRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    suppliers: Arc<RwLock<BTreeMap<SupplierId, SupplierRecord>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records, e.g. from a registration fixture
    pub async fn with_suppliers(records: impl IntoIterator<Item = SupplierRecord>) -> Self {
        let storage = Self::new();
        {
            let mut suppliers = storage.suppliers.write().await;
            for record in records {
                suppliers.insert(record.id, record);
            }
        }
        storage
    }
}

#[async_trait]
impl SupplierStorage for InMemoryStorage {
    async fn get_supplier(&self, id: SupplierId) -> StorageResult<Option<SupplierRecord>> {
        let suppliers = self.suppliers.read().await;
        Ok(suppliers.get(&id).cloned())
    }

    async fn list_suppliers(&self) -> StorageResult<Vec<SupplierRecord>> {
        let suppliers = self.suppliers.read().await;
        Ok(suppliers.values().cloned().collect())
    }

    async fn save_supplier(&self, record: &SupplierRecord) -> StorageResult<()> {
        let mut suppliers = self.suppliers.write().await;
        suppliers.insert(record.id, record.clone());
        Ok(())
    }

    async fn claim_candidates(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<SupplierRecord>> {
        let mut suppliers = self.suppliers.write().await;

        let ids: Vec<SupplierId> = suppliers
            .values()
            .filter(|r| is_candidate(r, stale_before))
            .map(|r| r.id)
            .take(limit)
            .collect();

        // Validate every claim before applying any, so the batch commits as one
        let mut claimed = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut record = suppliers
                .get(id)
                .cloned()
                .ok_or(StorageError::NotFound(*id))?;
            record
                .claim(now)
                .map_err(|e| StorageError::Conflict(e.to_string()))?;
            claimed.push(record);
        }
        for record in &claimed {
            suppliers.insert(record.id, record.clone());
        }

        Ok(claimed)
    }
}
