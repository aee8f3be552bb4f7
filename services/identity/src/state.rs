//! Application state shared across handlers

use common::cache::KeyValueCache;
use std::sync::Arc;

use crate::{
    authenticator::CredentialAuthenticator,
    config::Settings,
    context_cache::AuthorizationContextCache,
    jwt::JwtService,
    lockout::{LockoutGuard, LockoutPolicy},
    password::PasswordService,
    repositories::{AttemptLedger, RefreshTokenStore, RoleStore, UserStore},
    role_admin::RoleAdministration,
    rotation::TokenRotator,
    tokens::TokenIssuer,
};

/// Storage collaborators the identity core runs on
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub attempts: Arc<dyn AttemptLedger>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub roles: Arc<dyn RoleStore>,
    pub cache: Arc<dyn KeyValueCache>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_service: JwtService,
    pub authenticator: CredentialAuthenticator,
    pub rotator: TokenRotator,
    pub contexts: AuthorizationContextCache,
    pub role_admin: RoleAdministration,
}

impl AppState {
    /// Wire every component over the given backends
    pub fn new(
        settings: Settings,
        jwt_service: JwtService,
        passwords: PasswordService,
        backends: Backends,
    ) -> Self {
        let issuer = TokenIssuer::new(
            jwt_service.clone(),
            settings.refresh_token_ttl(),
            settings.refresh_token_pepper.clone(),
        );

        let lockout = LockoutGuard::new(backends.attempts.clone(), LockoutPolicy::from(&settings));

        let authenticator = CredentialAuthenticator::new(
            backends.users.clone(),
            backends.refresh_tokens.clone(),
            lockout,
            passwords,
            issuer.clone(),
        )
        .with_password_max_age(settings.password_max_age());

        let rotator = TokenRotator::new(
            backends.users.clone(),
            backends.refresh_tokens.clone(),
            issuer,
        );

        let contexts = AuthorizationContextCache::new(
            backends.cache.clone(),
            backends.users.clone(),
            backends.roles.clone(),
        );

        let role_admin = RoleAdministration::new(backends.roles.clone(), contexts.clone());

        Self {
            settings: Arc::new(settings),
            jwt_service,
            authenticator,
            rotator,
            contexts,
            role_admin,
        }
    }
}
