//! Shared fixtures for the identity integration tests

#![allow(dead_code)]

use argon2::Params;
use chrono::{Duration, Utc};
use common::cache::InMemoryCache;
use std::sync::Arc;
use uuid::Uuid;

use identity::{
    AppState, Backends,
    config::Settings,
    jwt::{JwtConfig, JwtService, KeyMaterial},
    models::{ResourcePermission, Scope, User},
    password::PasswordService,
    repositories::{
        InMemoryAttemptLedger, InMemoryRefreshTokenStore, InMemoryRoleStore, InMemoryUserStore,
    },
    tokens::TokenIssuer,
};

pub const PASSWORD: &str = "Correct-Horse-9";
pub const SOURCE: &str = "10.0.0.1";

/// In-memory identity core with handles on every store
pub struct Harness {
    pub users: InMemoryUserStore,
    pub attempts: InMemoryAttemptLedger,
    pub refresh_tokens: InMemoryRefreshTokenStore,
    pub roles: InMemoryRoleStore,
    pub cache: InMemoryCache,
    pub passwords: PasswordService,
    pub jwt: JwtService,
    pub settings: Settings,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let users = InMemoryUserStore::new();
        let attempts = InMemoryAttemptLedger::new();
        let refresh_tokens = InMemoryRefreshTokenStore::new();
        let roles = InMemoryRoleStore::new();
        let cache = InMemoryCache::new();

        // Cheap argon2 cost keeps the suite fast
        let passwords =
            PasswordService::with_params(Params::new(8, 1, 1, None).unwrap()).unwrap();

        let jwt = JwtService::new(JwtConfig {
            key_material: KeyMaterial::Secret("integration-secret".to_string()),
            access_token_ttl: settings.access_token_ttl(),
        })
        .unwrap();

        let backends = Backends {
            users: Arc::new(users.clone()),
            attempts: Arc::new(attempts.clone()),
            refresh_tokens: Arc::new(refresh_tokens.clone()),
            roles: Arc::new(roles.clone()),
            cache: Arc::new(cache.clone()),
        };

        let state = AppState::new(settings.clone(), jwt.clone(), passwords.clone(), backends);

        Self {
            users,
            attempts,
            refresh_tokens,
            roles,
            cache,
            passwords,
            jwt,
            settings,
            state,
        }
    }

    /// Issuer configured like the one inside the app state
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(
            self.jwt.clone(),
            self.settings.refresh_token_ttl(),
            self.settings.refresh_token_pepper.clone(),
        )
    }

    /// Active user whose password is [`PASSWORD`]
    pub async fn add_user(&self, login: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash: self.passwords.hash(PASSWORD).await.unwrap(),
            is_active: true,
            employee_id: Some(Uuid::new_v4()),
            section_id: Some(Uuid::new_v4()),
            password_changed_at: now,
            password_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.clone()).await;
        user
    }

    /// Same as [`Harness::add_user`] with a password that expired an hour ago
    pub async fn add_user_with_expired_password(&self, login: &str) -> User {
        let mut user = self.add_user(login).await;
        user.password_expires_at = Some(Utc::now() - Duration::hours(1));
        self.users.insert(user.clone()).await;
        user
    }
}

pub fn grant(
    resource: &str,
    (can_create, can_edit, can_delete): (bool, bool, bool),
    scope: Scope,
) -> ResourcePermission {
    ResourcePermission {
        // Overwritten with the target role on write
        role_id: Uuid::nil(),
        resource: resource.to_string(),
        can_create,
        can_edit,
        can_delete,
        scope,
    }
}
