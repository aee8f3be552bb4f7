//! Credential authenticator: the login flow
//!
//! Each call appends exactly one row to the attempt ledger and, on success
//! only, one refresh token row.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    lockout::LockoutGuard,
    models::{NewLoginAttempt, user::normalize_login},
    password::PasswordService,
    repositories::{RefreshTokenStore, UserStore},
    tokens::{TokenIssuer, TokenPair},
    validation::validate_password,
};

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub tokens: TokenPair,
    /// The caller must change the password before doing anything else
    pub password_expired: bool,
}

#[derive(Clone)]
pub struct CredentialAuthenticator {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    lockout: LockoutGuard,
    passwords: PasswordService,
    issuer: TokenIssuer,
    password_max_age: Option<Duration>,
}

impl CredentialAuthenticator {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        lockout: LockoutGuard,
        passwords: PasswordService,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            lockout,
            passwords,
            issuer,
            password_max_age: None,
        }
    }

    /// Lifetime given to passwords set through `change_password`
    pub fn with_password_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.password_max_age = max_age;
        self
    }

    /// Authenticate `identifier`/`password` coming from `source_address`
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        source_address: &str,
    ) -> AuthResult<LoginOutcome> {
        let identifier = normalize_login(identifier);
        let now = Utc::now();

        if self.lockout.is_source_throttled(source_address, now).await? {
            self.fail(&identifier, source_address, None).await?;
            return Err(AuthError::RateLimited);
        }

        let Some(user) = self.users.find_by_login(&identifier).await? else {
            // Same argon2 cost as a real mismatch
            self.passwords.verify_dummy(password).await?;
            self.fail(&identifier, source_address, None).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if self.lockout.is_identifier_locked(&identifier, now).await? {
            self.fail(&identifier, source_address, Some(user.id)).await?;
            return Err(AuthError::AccountLocked);
        }

        if !user.is_active {
            info!(user_id = %user.id, "Login rejected for inactive user");
            self.fail(&identifier, source_address, Some(user.id)).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if !self.passwords.verify(password, &user.password_hash).await? {
            self.fail(&identifier, source_address, Some(user.id)).await?;
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout
            .record(NewLoginAttempt::success(&identifier, source_address, user.id))
            .await?;

        let issued = self.issuer.issue(user.id, &user.login, now)?;
        self.refresh_tokens.insert(&issued.record).await?;

        info!(user_id = %user.id, source = %source_address, "Login succeeded");

        Ok(LoginOutcome {
            tokens: issued.pair,
            password_expired: user.password_expired(now),
        })
    }

    /// Replace a user's password after checking the current one.
    ///
    /// Every refresh token of the user is revoked, so all sessions must log in
    /// again.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AuthError::Unauthenticated),
        };

        if !self.passwords.verify(current_password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        validate_password(new_password).map_err(AuthError::Validation)?;
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must differ from the current one".to_string(),
            ));
        }

        let now = Utc::now();
        let hash = self.passwords.hash(new_password).await?;
        let expires_at = self.password_max_age.map(|age| now + age);

        // Sessions go first: a failure after this point leaves the old
        // password in place with no live refresh tokens.
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id, now).await?;
        self.users
            .update_password(user_id, &hash, now, expires_at)
            .await?;

        info!(user_id = %user_id, revoked, "Password changed");
        Ok(())
    }

    async fn fail(
        &self,
        identifier: &str,
        source_address: &str,
        user_id: Option<Uuid>,
    ) -> AuthResult<()> {
        warn!(identifier = %identifier, source = %source_address, "Login failed");
        self.lockout
            .record(NewLoginAttempt::failure(identifier, source_address, user_id))
            .await?;
        Ok(())
    }
}

