//! Role grants

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Scope;

/// Grant of one role on one protected resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub role_id: Uuid,
    pub resource: String,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub scope: Scope,
}
