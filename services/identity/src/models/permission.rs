//! Derived authorization types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Breadth of the records a grant applies to.
///
/// Variants are declared narrowest first so the derived ordering is
/// `Own < Section < Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Section,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Section => "section",
            Scope::Global => "global",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored as SMALLINT
impl From<Scope> for i16 {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Own => 0,
            Scope::Section => 1,
            Scope::Global => 2,
        }
    }
}

impl TryFrom<i16> for Scope {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Scope::Own),
            1 => Ok(Scope::Section),
            2 => Ok(Scope::Global),
            other => Err(anyhow::anyhow!("unknown scope value {}", other)),
        }
    }
}

/// Union of every grant a user holds on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPermission {
    pub resource: String,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub scope: Scope,
}

/// Everything the enforcer needs to know about a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationContext {
    pub user_id: Uuid,
    pub login: String,
    pub employee_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub permissions: HashMap<String, AggregatedPermission>,
}

impl AuthorizationContext {
    pub fn permission(&self, resource: &str) -> Option<&AggregatedPermission> {
        self.permissions.get(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ordering() {
        assert!(Scope::Own < Scope::Section);
        assert!(Scope::Section < Scope::Global);
        assert_eq!(
            [Scope::Section, Scope::Global, Scope::Own].iter().max(),
            Some(&Scope::Global)
        );
    }

    #[test]
    fn test_scope_storage_mapping() {
        for scope in [Scope::Own, Scope::Section, Scope::Global] {
            assert_eq!(Scope::try_from(i16::from(scope)).unwrap(), scope);
        }
        assert!(Scope::try_from(7).is_err());
    }
}
