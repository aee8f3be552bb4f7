//! Identity service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    enforcer::{GrantedAccess, ResourceRequirement},
    error::{AuthError, AuthResult},
    middleware::{auth_middleware, require_access},
    models::{AuthorizationContext, LoginCredentials, ResourcePermission, Scope},
    state::AppState,
    tokens::TokenPair,
};

/// Resource code guarding role grant administration
pub const ROLES_RESOURCE: &str = "ROLES";
/// Resource code guarding user role assignment
pub const USERS_RESOURCE: &str = "USERS";

/// Response for token issuance
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenResponse {
    fn new(pair: TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            expires_in: (pair.expires_at - now).num_seconds().max(0),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: pair.expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

/// Response for user login
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub password_expired: bool,
}

/// Request carrying a refresh token
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request for a password change
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// One grant in a role grant replacement
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub resource: String,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    pub scope: Scope,
}

/// Request replacing a user's roles
#[derive(Deserialize)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<Uuid>,
}

/// Create the router for the identity service
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let roles = Router::new()
        .route("/roles/:role_id/permissions", put(replace_role_permissions))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ResourceRequirement::new(ROLES_RESOURCE)),
            require_access,
        ));

    let users = Router::new()
        .route("/users/:user_id/roles", put(assign_user_roles))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), ResourceRequirement::new(USERS_RESOURCE)),
            require_access,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .merge(authenticated)
        .merge(roles)
        .merge(users)
        .with_state(state)
}

/// Run `operation` under the configured request deadline
async fn with_deadline<T>(
    state: &AppState,
    operation: impl Future<Output = AuthResult<T>>,
) -> AuthResult<T> {
    tokio::time::timeout(state.settings.request_timeout(), operation)
        .await
        .map_err(|_| {
            warn!("Request deadline exceeded");
            AuthError::DeadlineExceeded
        })?
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "identity"
    }))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    let source = addr.ip().to_string();

    let outcome = with_deadline(
        &state,
        state
            .authenticator
            .login(&payload.login, &payload.password, &source),
    )
    .await?;

    let response = LoginResponse {
        tokens: TokenResponse::new(outcome.tokens, Utc::now()),
        password_expired: outcome.password_expired,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let pair = with_deadline(&state, state.rotator.rotate(&payload.refresh_token)).await?;

    Ok((StatusCode::OK, Json(TokenResponse::new(pair, Utc::now()))))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    with_deadline(&state, state.rotator.logout(&payload.refresh_token)).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Authorization context of the caller
pub async fn me(Extension(context): Extension<AuthorizationContext>) -> impl IntoResponse {
    Json(context)
}

/// Password change endpoint
pub async fn change_password(
    State(state): State<AppState>,
    Extension(context): Extension<AuthorizationContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    with_deadline(
        &state,
        state.authenticator.change_password(
            context.user_id,
            &payload.current_password,
            &payload.new_password,
        ),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replace every grant of a role
pub async fn replace_role_permissions(
    State(state): State<AppState>,
    Extension(granted): Extension<GrantedAccess>,
    Path(role_id): Path<Uuid>,
    Json(payload): Json<Vec<GrantRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let grants = payload
        .into_iter()
        .map(|grant| ResourcePermission {
            role_id,
            resource: grant.resource,
            can_create: grant.can_create,
            can_edit: grant.can_edit,
            can_delete: grant.can_delete,
            scope: grant.scope,
        })
        .collect();

    let evicted = with_deadline(&state, state.role_admin.replace_role_grants(role_id, grants)).await?;

    info!(actor = %granted.user_id, role_id = %role_id, "Role grants updated");

    Ok(Json(serde_json::json!({
        "role_id": role_id,
        "evicted_contexts": evicted
    })))
}

/// Replace the roles held by a user
pub async fn assign_user_roles(
    State(state): State<AppState>,
    Extension(granted): Extension<GrantedAccess>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRolesRequest>,
) -> Result<impl IntoResponse, AuthError> {
    with_deadline(&state, state.role_admin.assign_roles(user_id, payload.role_ids)).await?;

    info!(actor = %granted.user_id, user_id = %user_id, "User roles updated");

    Ok(StatusCode::NO_CONTENT)
}
