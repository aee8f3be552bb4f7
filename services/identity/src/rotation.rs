//! Refresh token rotation with reuse detection
//!
//! ```text
//! Active ──rotate──▶ Revoked (replaced_by = successor)
//!   │  └──logout───▶ Revoked
//!   └──time───────▶ Expired
//! Revoked ──rotate──▶ every token of the owner revoked (theft response),
//!                     unless the revocation happened during this call
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{AuthError, AuthResult},
    models::TokenState,
    repositories::{RefreshTokenStore, UserStore},
    tokens::{TokenIssuer, TokenPair},
};

#[derive(Clone)]
pub struct TokenRotator {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    issuer: TokenIssuer,
}

impl TokenRotator {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            issuer,
        }
    }

    /// Exchange a refresh token for a new pair. Succeeds at most once per token.
    pub async fn rotate(&self, raw_token: &str) -> AuthResult<TokenPair> {
        let token_hash = self.issuer.hash_refresh_token(raw_token);
        let now = Utc::now();

        let Some(record) = self.refresh_tokens.find_by_hash(&token_hash).await? else {
            return Err(AuthError::InvalidToken);
        };

        match record.state(now) {
            TokenState::Expired => return Err(AuthError::TokenExpired),
            // Revoked after this call started: a concurrent rotation won
            TokenState::Revoked if record.revoked_at >= Some(now) => {
                info!(user_id = %record.user_id, token_id = %record.id, "Refresh token rotation lost a race");
                return Err(AuthError::InvalidToken);
            }
            TokenState::Revoked => {
                let revoked = self
                    .refresh_tokens
                    .revoke_all_for_user(record.user_id, now)
                    .await?;
                warn!(
                    user_id = %record.user_id,
                    token_id = %record.id,
                    revoked,
                    "Revoked refresh token presented again, terminating all sessions"
                );
                return Err(AuthError::TokenReused);
            }
            TokenState::Active => {}
        }

        let user = match self.users.find_by_id(record.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.refresh_tokens.revoke(&token_hash, now).await?;
                info!(user_id = %record.user_id, "Refresh rejected for missing or inactive user");
                return Err(AuthError::InvalidToken);
            }
        };

        let issued = self.issuer.issue(user.id, &user.login, now)?;

        // Losing this compare-and-set means a concurrent call consumed the
        // token after our read. That is not reuse; only our call fails.
        if !self
            .refresh_tokens
            .rotate(&token_hash, &issued.record, now)
            .await?
        {
            info!(user_id = %user.id, token_id = %record.id, "Refresh token rotation lost a race");
            return Err(AuthError::InvalidToken);
        }

        info!(user_id = %user.id, "Refresh token rotated");
        Ok(issued.pair)
    }

    /// Revoke a refresh token. Unknown or already dead tokens are fine.
    pub async fn logout(&self, raw_token: &str) -> AuthResult<()> {
        let token_hash = self.issuer.hash_refresh_token(raw_token);

        if self.refresh_tokens.revoke(&token_hash, Utc::now()).await? {
            info!("Refresh token revoked on logout");
        }

        Ok(())
    }
}
