//! Identity core: credential authentication, token rotation and
//! per-resource authorization.
//!
//! Storage and cache collaborators sit behind traits so the whole flow can
//! run over PostgreSQL and Redis in production or over the in-memory stores
//! in tests.

pub mod authenticator;
pub mod config;
pub mod context_cache;
pub mod enforcer;
pub mod error;
pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod models;
pub mod password;
pub mod permissions;
pub mod repositories;
pub mod role_admin;
pub mod rotation;
pub mod routes;
pub mod state;
pub mod tokens;
pub mod validation;

pub use error::{AuthError, AuthResult};
pub use state::{AppState, Backends};
