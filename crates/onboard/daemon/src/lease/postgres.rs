//! PostgreSQL lease manager

use super::{expiry, LeaseManager};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;

/// Leases stored in `onboarding_leases`, shared by every daemon on the database
#[derive(Debug, Clone)]
pub struct PostgresLeaseManager {
    pool: PgPool,
}

impl PostgresLeaseManager {
    pub async fn new(pool: PgPool) -> StorageResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS onboarding_leases (
                key TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl LeaseManager for PostgresLeaseManager {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let now = Utc::now();
        let expires_at = expiry(now, ttl);

        // The update branch only fires on an expired row
        let result = sqlx::query(
            r#"
            INSERT INTO onboarding_leases (key, holder, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key)
            DO UPDATE SET
                holder = EXCLUDED.holder,
                expires_at = EXCLUDED.expires_at
            WHERE onboarding_leases.expires_at <= $4
            "#,
        )
        .bind(key)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn renew(&self, key: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE onboarding_leases SET expires_at = $3 WHERE key = $1 AND holder = $2",
        )
        .bind(key)
        .bind(holder)
        .bind(expiry(Utc::now(), ttl))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, key: &str, holder: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM onboarding_leases WHERE key = $1 AND holder = $2")
            .bind(key)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
