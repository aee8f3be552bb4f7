//! Role assignments and per-resource grants backed by PostgreSQL

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::RoleStore;
use crate::models::{ResourcePermission, Scope};

#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn grants_for_user(&self, user_id: Uuid) -> Result<Vec<ResourcePermission>> {
        let rows = sqlx::query(
            r#"
            SELECT rp.role_id, rp.resource, rp.can_create, rp.can_edit, rp.can_delete, rp.scope
            FROM role_permissions rp
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ResourcePermission> {
                Ok(ResourcePermission {
                    role_id: row.get("role_id"),
                    resource: row.get("resource"),
                    can_create: row.get("can_create"),
                    can_edit: row.get("can_edit"),
                    can_delete: row.get("can_delete"),
                    scope: Scope::try_from(row.get::<i16, _>("scope"))?,
                })
            })
            .collect()
    }

    async fn holders_of_role(&self, role_id: Uuid) -> Result<Vec<Uuid>> {
        let holders =
            sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM user_roles WHERE role_id = $1")
                .bind(role_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(holders)
    }

    async fn replace_role_grants(
        &self,
        role_id: Uuid,
        grants: &[ResourcePermission],
    ) -> Result<()> {
        info!(role_id = %role_id, grants = grants.len(), "Replacing role grants");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for grant in grants {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, resource, can_create, can_edit, can_delete, scope)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(role_id)
            .bind(&grant.resource)
            .bind(grant.can_create)
            .bind(grant.can_edit)
            .bind(grant.can_delete)
            .bind(i16::from(grant.scope))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<()> {
        info!(user_id = %user_id, roles = role_ids.len(), "Replacing user roles");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in role_ids {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
