//! In-memory storage implementations
//!
//! Each store keeps its rows behind one `tokio::sync::Mutex`, so every trait
//! method is atomic with respect to the others on the same store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AttemptLedger, RefreshTokenStore, RoleStore, UserStore};
use crate::models::{
    LoginAttempt, NewLoginAttempt, RefreshToken, ResourcePermission, User, user::normalize_login,
};

/// Users keyed by id
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user
    pub async fn insert(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.is_active = is_active;
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let wanted = normalize_login(login);
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| normalize_login(&user.login) == wanted)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {} not found", id))?;

        user.password_hash = password_hash.to_string();
        user.password_changed_at = changed_at;
        user.password_expires_at = expires_at;
        user.updated_at = changed_at;
        Ok(())
    }
}

/// Attempts in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttemptLedger {
    attempts: Arc<Mutex<Vec<LoginAttempt>>>,
}

impl InMemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded attempt
    pub async fn attempts(&self) -> Vec<LoginAttempt> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait]
impl AttemptLedger for InMemoryAttemptLedger {
    async fn record(&self, attempt: &NewLoginAttempt) -> Result<()> {
        self.attempts.lock().await.push(LoginAttempt {
            id: Uuid::new_v4(),
            identifier: attempt.identifier.clone(),
            source_address: attempt.source_address.clone(),
            attempted_at: attempt.attempted_at,
            succeeded: attempt.succeeded,
            user_id: attempt.user_id,
        });
        Ok(())
    }

    async fn count_failures_for_identifier(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let attempts = self.attempts.lock().await;
        Ok(attempts
            .iter()
            .filter(|a| !a.succeeded && a.identifier == identifier && a.attempted_at >= since)
            .count() as u64)
    }

    async fn count_failures_for_source(
        &self,
        source_address: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let attempts = self.attempts.lock().await;
        Ok(attempts
            .iter()
            .filter(|a| {
                !a.succeeded && a.source_address == source_address && a.attempted_at >= since
            })
            .count() as u64)
    }
}

/// Refresh tokens keyed by hash
#[derive(Debug, Clone, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<Mutex<HashMap<String, RefreshToken>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token of a user, in no particular order
    pub async fn tokens_for_user(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.tokens
            .lock()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = self.tokens.lock().await;
        if tokens.contains_key(&token.token_hash) {
            anyhow::bail!("duplicate refresh token hash");
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        Ok(self.tokens.lock().await.get(token_hash).cloned())
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tokens = self.tokens.lock().await;

        match tokens.get_mut(old_hash) {
            Some(old) if old.revoked_at.is_none() => {
                old.revoked_at = Some(now);
                old.replaced_by = Some(replacement.token_hash.clone());
            }
            _ => return Ok(false),
        }

        tokens.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get_mut(token_hash) {
            Some(token) if token.is_active(now) => {
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut revoked = 0;
        for token in tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && t.revoked_at.is_none())
        {
            token.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[derive(Debug, Default)]
struct RoleTables {
    grants: HashMap<Uuid, Vec<ResourcePermission>>,
    assignments: HashMap<Uuid, HashSet<Uuid>>,
}

/// Role grants and user-role assignments
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    tables: Arc<Mutex<RoleTables>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn grants_for_user(&self, user_id: Uuid) -> Result<Vec<ResourcePermission>> {
        let tables = self.tables.lock().await;
        let Some(roles) = tables.assignments.get(&user_id) else {
            return Ok(Vec::new());
        };

        Ok(roles
            .iter()
            .filter_map(|role_id| tables.grants.get(role_id))
            .flatten()
            .cloned()
            .collect())
    }

    async fn holders_of_role(&self, role_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|(_, roles)| roles.contains(&role_id))
            .map(|(user_id, _)| *user_id)
            .collect())
    }

    async fn replace_role_grants(
        &self,
        role_id: Uuid,
        grants: &[ResourcePermission],
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let grants = grants
            .iter()
            .map(|grant| ResourcePermission {
                role_id,
                ..grant.clone()
            })
            .collect();
        tables.grants.insert(role_id, grants);
        Ok(())
    }

    async fn set_user_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .assignments
            .insert(user_id, role_ids.iter().copied().collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(user_id: Uuid, hash: &str) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash.to_string(),
            created_at: now,
            expires_at: now + Duration::days(1),
            revoked_at: None,
            replaced_by: None,
        }
    }

    #[tokio::test]
    async fn test_rotate_is_compare_and_set() {
        let store = InMemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store.insert(&token(user_id, "old")).await.unwrap();

        let now = Utc::now();
        assert!(store.rotate("old", &token(user_id, "new-a"), now).await.unwrap());
        assert!(!store.rotate("old", &token(user_id, "new-b"), now).await.unwrap());

        let old = store.find_by_hash("old").await.unwrap().unwrap();
        assert_eq!(old.replaced_by.as_deref(), Some("new-a"));
        assert!(store.find_by_hash("new-a").await.unwrap().is_some());
        assert!(store.find_by_hash("new-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_one_user() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert(&token(alice, "a1")).await.unwrap();
        store.insert(&token(alice, "a2")).await.unwrap();
        store.insert(&token(bob, "b1")).await.unwrap();

        assert_eq!(store.revoke_all_for_user(alice, Utc::now()).await.unwrap(), 2);
        assert!(store.find_by_hash("b1").await.unwrap().unwrap().revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_failure_counts_respect_window() {
        let ledger = InMemoryAttemptLedger::new();
        let now = Utc::now();

        ledger
            .record(&NewLoginAttempt::failure("jdoe", "10.0.0.1", None).at(now - Duration::hours(2)))
            .await
            .unwrap();
        ledger
            .record(&NewLoginAttempt::failure("jdoe", "10.0.0.1", None).at(now))
            .await
            .unwrap();
        ledger
            .record(&NewLoginAttempt::success("jdoe", "10.0.0.1", Uuid::new_v4()).at(now))
            .await
            .unwrap();

        let since = now - Duration::minutes(15);
        assert_eq!(ledger.count_failures_for_identifier("jdoe", since).await.unwrap(), 1);
        assert_eq!(ledger.count_failures_for_source("10.0.0.1", since).await.unwrap(), 1);
        assert_eq!(ledger.count_failures_for_source("10.0.0.2", since).await.unwrap(), 0);
    }
}
