//! PostgreSQL storage implementation

use super::traits::*;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onboard_types::{
    ChannelRef, ContractStatus, DocumentRef, StateCode, SupplierId, SupplierRecord,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgExecutor, PgPool, Row};
use std::time::Duration;

const SUPPLIER_COLUMNS: &str = "id, company_name, contact_email, channel_ref, state_code, \
     contract_status, contract_document_ref, data, updated_at";

/// PostgreSQL-backed storage
///
/// The code columns (`state_code`, `contract_status`, `channel_ref`,
/// `contract_document_ref`) are authoritative for reporting tools; `data`
/// carries the rest of the record.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to PostgreSQL and initialize schema
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    /// Shared pool, reused by the lease manager
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS suppliers (
                id BIGINT PRIMARY KEY,
                company_name TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                channel_ref TEXT,
                state_code TEXT,
                contract_status TEXT,
                contract_document_ref TEXT,
                has_credentials BOOLEAN NOT NULL DEFAULT FALSE,
                claimed_at TIMESTAMPTZ,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS suppliers_state_code ON suppliers(state_code, id);"#,
            r#"CREATE INDEX IF NOT EXISTS suppliers_claimed_at ON suppliers(claimed_at) WHERE claimed_at IS NOT NULL;"#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        Ok(())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StorageError> {
        serde_json::to_value(value)
            .map_err(|e| StorageError::InvalidData(format!("json serialize error: {}", e)))
    }

    fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StorageError> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::InvalidData(format!("json deserialize error: {}", e)))
    }

    fn from_row(row: &PgRow) -> StorageResult<SupplierRecord> {
        let id: i64 = row.try_get("id")?;
        let state_code: Option<String> = row.try_get("state_code")?;
        let contract_status: Option<String> = row.try_get("contract_status")?;
        let channel_ref: Option<String> = row.try_get("channel_ref")?;
        let document_ref: Option<String> = row.try_get("contract_document_ref")?;
        let data: Value = row.try_get("data")?;
        let stored: SupplierRecord = Self::from_json(data)?;

        let mut record = SupplierRecord::restore(
            SupplierId::new(id),
            row.try_get("company_name")?,
            row.try_get("contact_email")?,
            channel_ref.map(ChannelRef::new),
            StateCode::from_code(state_code.as_deref())?,
            ContractStatus::from_code(contract_status.as_deref())?,
            document_ref.map(DocumentRef::new),
            row.try_get("updated_at")?,
        );
        record.claimed_from = stored.claimed_from;
        record.claimed_at = stored.claimed_at;
        record.last_error = stored.last_error;
        record.credentials = stored.credentials;
        record.contract_template = stored.contract_template;
        record.contract_skipped = stored.contract_skipped;
        Ok(record)
    }

    async fn write_record<'e, E>(executor: E, record: &SupplierRecord) -> StorageResult<()>
    where
        E: PgExecutor<'e>,
    {
        let data = Self::to_json(record)?;

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, company_name, contact_email, channel_ref, state_code, contract_status,
                contract_document_ref, has_credentials, claimed_at, data, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id)
            DO UPDATE SET
                company_name = EXCLUDED.company_name,
                contact_email = EXCLUDED.contact_email,
                channel_ref = EXCLUDED.channel_ref,
                state_code = EXCLUDED.state_code,
                contract_status = EXCLUDED.contract_status,
                contract_document_ref = EXCLUDED.contract_document_ref,
                has_credentials = EXCLUDED.has_credentials,
                claimed_at = EXCLUDED.claimed_at,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.value())
        .bind(&record.company_name)
        .bind(&record.contact_email)
        .bind(record.channel_ref().map(|c| c.as_str().to_string()))
        .bind(record.state().code())
        .bind(record.contract_status().code())
        .bind(record.contract_document_ref().map(|d| d.as_str().to_string()))
        .bind(record.has_credentials())
        .bind(record.claimed_at)
        .bind(data)
        .bind(record.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SupplierStorage for PostgresStorage {
    async fn get_supplier(&self, id: SupplierId) -> StorageResult<Option<SupplierRecord>> {
        let row = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_suppliers(&self) -> StorageResult<Vec<SupplierRecord>> {
        let rows = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn save_supplier(&self, record: &SupplierRecord) -> StorageResult<()> {
        Self::write_record(&self.pool, record).await
    }

    async fn claim_candidates(
        &self,
        limit: usize,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<SupplierRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM suppliers
            WHERE state_code IS NULL
               OR state_code = 'I'
               OR (state_code = 'RA' AND has_credentials)
               OR (state_code = 'P' AND (claimed_at IS NULL OR claimed_at < $1))
               OR (state_code = 'A' AND claimed_at IS NOT NULL AND claimed_at < $1)
            ORDER BY id ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Self::from_row(row)?;
            record
                .claim(now)
                .map_err(|e| StorageError::Conflict(e.to_string()))?;
            Self::write_record(&mut *tx, &record).await?;
            claimed.push(record);
        }

        tx.commit().await?;
        Ok(claimed)
    }
}
