//! Middleware for bearer authentication and per-route access enforcement

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;

use crate::{
    enforcer::{self, ResourceRequirement},
    error::{AuthError, AuthResult},
    models::AuthorizationContext,
    state::AppState,
};

/// Response header carrying the resolved scope
pub const ACCESS_SCOPE_HEADER: &str = "x-access-scope";

type BearerHeader = TypedHeader<Authorization<Bearer>>;

/// Resolve the caller's context from a bearer token.
///
/// The subject is trusted only after signature and expiry checks pass.
pub async fn authenticate(state: &AppState, token: Option<&str>) -> AuthResult<AuthorizationContext> {
    let token = token.ok_or(AuthError::Unauthenticated)?;

    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        AuthError::Unauthenticated
    })?;

    state
        .contexts
        .get(claims.sub)
        .await?
        .ok_or(AuthError::Unauthenticated)
}

/// Require a valid bearer token and expose the caller's context to handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer.as_ref().map(|TypedHeader(Authorization(b))| b.token());
    let context = authenticate(&state, token).await?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Enforce a resource requirement on every route below this layer.
///
/// Handlers receive the caller's context and the [`enforcer::GrantedAccess`]
/// as request extensions; the resolved scope is echoed in a response header.
pub async fn require_access(
    State((state, requirement)): State<(AppState, ResourceRequirement)>,
    bearer: Option<BearerHeader>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer.as_ref().map(|TypedHeader(Authorization(b))| b.token());

    let context = match authenticate(&state, token).await {
        Ok(context) => Some(context),
        Err(AuthError::Unauthenticated) => None,
        Err(e) => return Err(e),
    };

    let granted = enforcer::authorize(context.as_ref(), &requirement, req.method())?;
    let scope = granted.scope;

    if let Some(context) = context {
        req.extensions_mut().insert(context);
    }
    req.extensions_mut().insert(granted);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(ACCESS_SCOPE_HEADER, HeaderValue::from_static(scope.as_str()));
    Ok(response)
}
