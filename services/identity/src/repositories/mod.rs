//! Storage collaborators of the identity core
//!
//! Every trait has a PostgreSQL implementation and an in-memory one. The
//! components only depend on the traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewLoginAttempt, RefreshToken, ResourcePermission, User};

pub mod attempts;
pub mod memory;
pub mod refresh_tokens;
pub mod roles;
pub mod user;

pub use attempts::PgAttemptLedger;
pub use memory::{InMemoryAttemptLedger, InMemoryRefreshTokenStore, InMemoryRoleStore, InMemoryUserStore};
pub use refresh_tokens::PgRefreshTokenStore;
pub use roles::PgRoleStore;
pub use user::UserRepository;

/// User lookups
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup by login identifier
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Replace the password hash and its timestamps
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Append-only record of login attempts
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    async fn record(&self, attempt: &NewLoginAttempt) -> Result<()>;

    /// Failed attempts for `identifier` at or after `since`
    async fn count_failures_for_identifier(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u64>;

    /// Failed attempts from `source_address` at or after `since`, any identifier
    async fn count_failures_for_source(
        &self,
        source_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64>;
}

/// Refresh token records
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> Result<()>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;

    /// Revoke `old_hash` in favour of `replacement` and persist `replacement`,
    /// as one atomic step.
    ///
    /// The revoke is conditional on `old_hash` still being unrevoked; when it
    /// is not, nothing is written and `false` is returned.
    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Revoke one token if it is still active. Returns whether a row changed.
    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Revoke every unrevoked token of a user. Returns the number revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64>;
}

/// Role assignments and grants
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Grants of every role the user holds
    async fn grants_for_user(&self, user_id: Uuid) -> Result<Vec<ResourcePermission>>;

    /// Users currently holding the role
    async fn holders_of_role(&self, role_id: Uuid) -> Result<Vec<Uuid>>;

    /// Replace all grants of a role
    async fn replace_role_grants(
        &self,
        role_id: Uuid,
        grants: &[ResourcePermission],
    ) -> Result<()>;

    /// Replace the set of roles a user holds
    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<()>;
}
