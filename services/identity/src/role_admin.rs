//! Write path for role grants and role assignments
//!
//! Every mutation goes through here so the context cache is invalidated
//! after the storage write succeeds.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    context_cache::AuthorizationContextCache,
    error::{AuthError, AuthResult},
    models::ResourcePermission,
    repositories::RoleStore,
};

#[derive(Clone)]
pub struct RoleAdministration {
    roles: Arc<dyn RoleStore>,
    contexts: AuthorizationContextCache,
}

impl RoleAdministration {
    pub fn new(roles: Arc<dyn RoleStore>, contexts: AuthorizationContextCache) -> Self {
        Self { roles, contexts }
    }

    /// Replace the grants of a role and evict every holder's context.
    ///
    /// A resource may appear at most once per role.
    pub async fn replace_role_grants(
        &self,
        role_id: Uuid,
        grants: Vec<ResourcePermission>,
    ) -> AuthResult<usize> {
        let mut seen = HashSet::new();
        for grant in &grants {
            if grant.resource.trim().is_empty() {
                return Err(AuthError::Validation("resource code is required".to_string()));
            }
            if !seen.insert(grant.resource.as_str()) {
                return Err(AuthError::Validation(format!(
                    "duplicate grant for resource {}",
                    grant.resource
                )));
            }
        }

        let grants: Vec<_> = grants
            .into_iter()
            .map(|grant| ResourcePermission { role_id, ..grant })
            .collect();

        self.roles.replace_role_grants(role_id, &grants).await?;
        let evicted = self.contexts.invalidate_role(role_id).await?;

        info!(role_id = %role_id, evicted, "Role grants replaced");
        Ok(evicted)
    }

    /// Replace the roles a user holds and evict that user's context
    pub async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<Uuid>) -> AuthResult<()> {
        self.roles.set_user_roles(user_id, &role_ids).await?;
        self.contexts.invalidate_user(user_id).await?;

        info!(user_id = %user_id, roles = role_ids.len(), "User roles replaced");
        Ok(())
    }
}
