//! Login attempt model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recorded login attempt. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub identifier: String,
    pub source_address: String,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub user_id: Option<Uuid>,
}

/// New login attempt payload
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub identifier: String,
    pub source_address: String,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub user_id: Option<Uuid>,
}

impl NewLoginAttempt {
    pub fn failure(identifier: &str, source_address: &str, user_id: Option<Uuid>) -> Self {
        Self {
            identifier: identifier.to_string(),
            source_address: source_address.to_string(),
            attempted_at: Utc::now(),
            succeeded: false,
            user_id,
        }
    }

    pub fn success(identifier: &str, source_address: &str, user_id: Uuid) -> Self {
        Self {
            succeeded: true,
            ..Self::failure(identifier, source_address, Some(user_id))
        }
    }

    /// Override the timestamp, mostly for backfilling history
    pub fn at(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.attempted_at = attempted_at;
        self
    }
}
