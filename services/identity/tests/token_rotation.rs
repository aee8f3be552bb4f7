//! Refresh token rotation, reuse detection and logout

mod support;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use identity::{
    AuthError,
    models::RefreshToken,
    repositories::{InMemoryRefreshTokenStore, RefreshTokenStore},
    rotation::TokenRotator,
};
use support::{Harness, PASSWORD, SOURCE};

async fn login(h: &Harness) -> String {
    h.state
        .authenticator
        .login("jdoe", PASSWORD, SOURCE)
        .await
        .unwrap()
        .tokens
        .refresh_token
}

#[tokio::test]
async fn test_rotate_replaces_token() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let first = login(&h).await;

    let pair = h.state.rotator.rotate(&first).await.unwrap();
    assert_ne!(pair.refresh_token, first);

    let claims = h.jwt.validate_token(&pair.access_token).unwrap();
    assert_eq!(claims.sub, user.id);

    let issuer = h.issuer();
    let old = h
        .refresh_tokens
        .find_by_hash(&issuer.hash_refresh_token(&first))
        .await
        .unwrap()
        .unwrap();
    assert!(old.is_revoked());
    assert_eq!(
        old.replaced_by.as_deref(),
        Some(issuer.hash_refresh_token(&pair.refresh_token).as_str())
    );

    // The successor rotates in turn
    assert!(h.state.rotator.rotate(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_replay_revokes_every_session() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let stolen = login(&h).await;
    let other_device = login(&h).await;

    let successor = h.state.rotator.rotate(&stolen).await.unwrap();

    let result = h.state.rotator.rotate(&stolen).await;
    assert!(matches!(result, Err(AuthError::TokenReused)));

    let now = Utc::now();
    let tokens = h.refresh_tokens.tokens_for_user(user.id).await;
    assert_eq!(tokens.len(), 3);
    assert!(tokens.iter().all(|t| !t.is_active(now)));

    for raw in [successor.refresh_token, other_device] {
        let result = h.state.rotator.rotate(&raw).await;
        assert!(matches!(result, Err(AuthError::TokenReused)));
    }
}

#[tokio::test]
async fn test_replay_leaves_other_users_alone() {
    let h = Harness::new();
    h.add_user("jdoe").await;
    let bystander = h.add_user("asmith").await;

    let stolen = login(&h).await;
    let theirs = h
        .state
        .authenticator
        .login("asmith", PASSWORD, SOURCE)
        .await
        .unwrap()
        .tokens
        .refresh_token;

    h.state.rotator.rotate(&stolen).await.unwrap();
    assert!(h.state.rotator.rotate(&stolen).await.is_err());

    let now = Utc::now();
    assert!(
        h.refresh_tokens
            .tokens_for_user(bystander.id)
            .await
            .iter()
            .all(|t| t.is_active(now))
    );
    assert!(h.state.rotator.rotate(&theirs).await.is_ok());
}

#[tokio::test]
async fn test_unknown_token_is_invalid() {
    let h = Harness::new();

    let result = h.state.rotator.rotate("not-a-real-token").await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let raw = "expired-refresh-token";
    let now = Utc::now();

    h.refresh_tokens
        .insert(&RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: h.issuer().hash_refresh_token(raw),
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
            revoked_at: None,
            replaced_by: None,
        })
        .await
        .unwrap();

    let result = h.state.rotator.rotate(raw).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));
    assert_eq!(h.refresh_tokens.tokens_for_user(user.id).await.len(), 1);
}

#[tokio::test]
async fn test_inactive_user_cannot_refresh() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let raw = login(&h).await;
    h.users.set_active(user.id, false).await;

    let result = h.state.rotator.rotate(&raw).await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));

    let now = Utc::now();
    assert!(
        h.refresh_tokens
            .tokens_for_user(user.id)
            .await
            .iter()
            .all(|t| !t.is_active(now))
    );
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let raw = login(&h).await;

    h.state.rotator.logout(&raw).await.unwrap();
    h.state.rotator.logout(&raw).await.unwrap();
    h.state.rotator.logout("never-issued").await.unwrap();

    let tokens = h.refresh_tokens.tokens_for_user(user.id).await;
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_revoked());
}

/// Serves a fixed snapshot from `find_by_hash`, as a reader that raced a
/// concurrent rotation would see it.
struct StaleReads {
    inner: InMemoryRefreshTokenStore,
    snapshot: RefreshToken,
}

#[async_trait]
impl RefreshTokenStore for StaleReads {
    async fn insert(&self, token: &RefreshToken) -> Result<()> {
        self.inner.insert(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        if token_hash == self.snapshot.token_hash {
            return Ok(Some(self.snapshot.clone()));
        }
        self.inner.find_by_hash(token_hash).await
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.rotate(old_hash, replacement, now).await
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        self.inner.revoke(token_hash, now).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        self.inner.revoke_all_for_user(user_id, now).await
    }
}

#[tokio::test]
async fn test_losing_a_rotation_race_is_not_theft() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let raw = login(&h).await;

    let snapshot = h
        .refresh_tokens
        .find_by_hash(&h.issuer().hash_refresh_token(&raw))
        .await
        .unwrap()
        .unwrap();

    let winner = h.state.rotator.rotate(&raw).await.unwrap();

    let slow = TokenRotator::new(
        Arc::new(h.users.clone()),
        Arc::new(StaleReads {
            inner: h.refresh_tokens.clone(),
            snapshot,
        }),
        h.issuer(),
    );

    let result = slow.rotate(&raw).await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));

    // Exactly one successor exists and it is still usable
    let now = Utc::now();
    let tokens = h.refresh_tokens.tokens_for_user(user.id).await;
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.iter().filter(|t| t.is_active(now)).count(), 1);
    assert!(h.state.rotator.rotate(&winner.refresh_token).await.is_ok());
}

/// Lets a competing rotation of the same token commit inside the lookup,
/// after the caller has started but before it reads the row.
struct RotatedDuringLookup {
    inner: InMemoryRefreshTokenStore,
    competitor: TokenRotator,
    raw: String,
    winner: Mutex<Option<String>>,
}

#[async_trait]
impl RefreshTokenStore for RotatedDuringLookup {
    async fn insert(&self, token: &RefreshToken) -> Result<()> {
        self.inner.insert(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let mut winner = self.winner.lock().await;
        if winner.is_none() {
            let pair = self.competitor.rotate(&self.raw).await?;
            *winner = Some(pair.refresh_token);
        }
        self.inner.find_by_hash(token_hash).await
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.rotate(old_hash, replacement, now).await
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        self.inner.revoke(token_hash, now).await
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        self.inner.revoke_all_for_user(user_id, now).await
    }
}

#[tokio::test]
async fn test_rotation_committed_during_lookup_is_not_theft() {
    let h = Harness::new();
    let user = h.add_user("jdoe").await;
    let raw = login(&h).await;

    let store = Arc::new(RotatedDuringLookup {
        inner: h.refresh_tokens.clone(),
        competitor: h.state.rotator.clone(),
        raw: raw.clone(),
        winner: Mutex::new(None),
    });
    let slow = TokenRotator::new(Arc::new(h.users.clone()), store.clone(), h.issuer());

    let result = slow.rotate(&raw).await;
    assert!(matches!(result, Err(AuthError::InvalidToken)));

    let winner = store.winner.lock().await.clone().unwrap();
    let now = Utc::now();
    let tokens = h.refresh_tokens.tokens_for_user(user.id).await;
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.iter().filter(|t| t.is_active(now)).count(), 1);
    assert!(h.state.rotator.rotate(&winner).await.is_ok());
}
