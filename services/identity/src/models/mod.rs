//! Identity service models

pub mod attempt;
pub mod permission;
pub mod refresh_token;
pub mod role;
pub mod user;

// Re-export for convenience
pub use attempt::{LoginAttempt, NewLoginAttempt};
pub use permission::{AggregatedPermission, AuthorizationContext, Scope};
pub use refresh_token::{RefreshToken, TokenState};
pub use role::ResourcePermission;
pub use user::{LoginCredentials, User};
