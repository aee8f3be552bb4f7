//! Refresh token store backed by PostgreSQL
//!
//! Rotation runs the conditional revoke and the insert of the successor in a
//! single transaction. Dropping the future before commit rolls both back.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, postgres::PgArguments, query::Query};
use tracing::info;
use uuid::Uuid;

use super::RefreshTokenStore;
use crate::models::RefreshToken;

const INSERT_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at, revoked_at, replaced_by)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn insert_query(token: &RefreshToken) -> Query<'static, Postgres, PgArguments> {
    sqlx::query(INSERT_TOKEN)
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.token_hash.clone())
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.replaced_by.clone())
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, token: &RefreshToken) -> Result<()> {
        insert_query(token).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at, revoked_at, replaced_by
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2, replaced_by = $3
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(old_hash)
        .bind(now)
        .bind(&replacement.token_hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if revoked != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_query(replacement).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked == 1)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        info!(user_id = %user_id, revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }
}
