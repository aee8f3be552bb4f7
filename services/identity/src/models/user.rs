//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity
///
/// `employee_id` and `section_id` link to records owned by the CRUD layer
/// and are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub employee_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub password_changed_at: DateTime<Utc>,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the caller must change the password before continuing
    pub fn password_expired(&self, now: DateTime<Utc>) -> bool {
        self.password_expires_at.is_some_and(|expires| expires <= now)
    }
}

/// User login credentials
#[derive(Debug, Clone, Deserialize)]
pub struct LoginCredentials {
    pub login: String,
    pub password: String,
}

/// Normalize a login identifier for lookups and attempt accounting
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}
