//! Error type shared by the identity components and the HTTP layer

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Outcome of a failed identity operation.
///
/// Everything except `Internal` is an expected result. `Internal` carries the
/// storage failure for logging; it never reaches the client.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Deliberately distinct from `InvalidCredentials`; it tells a caller the
    /// identifier exists.
    #[error("account temporarily locked")]
    AccountLocked,

    #[error("too many failed attempts from this address")]
    RateLimited,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("token reused, session revoked")]
    TokenReused,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err)
    }
}

impl AuthError {
    /// Bad credentials or a bad refresh token
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::AccountLocked
                | AuthError::InvalidToken
                | AuthError::TokenExpired
                | AuthError::TokenReused
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            e if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client
    ///
    /// Refresh failures collapse into one message so a client cannot tell an
    /// expired token from a replayed one.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::TokenReused => {
                "invalid token".to_string()
            }
            AuthError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(err) = &self {
            error!(error = ?err, "Internal error while handling identity request");
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (self.status(), body).into_response()
    }
}

/// Type alias for identity results
pub type AuthResult<T> = Result<T, AuthError>;
