//! Login attempt ledger backed by PostgreSQL

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AttemptLedger;
use crate::models::NewLoginAttempt;

#[derive(Clone)]
pub struct PgAttemptLedger {
    pool: PgPool,
}

impl PgAttemptLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptLedger for PgAttemptLedger {
    async fn record(&self, attempt: &NewLoginAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (id, identifier, source_address, attempted_at, succeeded, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&attempt.identifier)
        .bind(&attempt.source_address)
        .bind(attempt.attempted_at)
        .bind(attempt.succeeded)
        .bind(attempt.user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_failures_for_identifier(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM login_attempts \
             WHERE identifier = $1 AND succeeded = FALSE AND attempted_at >= $2",
        )
        .bind(identifier)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn count_failures_for_source(
        &self,
        source_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM login_attempts \
             WHERE source_address = $1 AND succeeded = FALSE AND attempted_at >= $2",
        )
        .bind(source_address)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
