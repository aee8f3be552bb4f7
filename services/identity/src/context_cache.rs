//! Read-through cache of authorization contexts
//!
//! Entries are stored as JSON without a TTL. Freshness depends entirely on
//! writers calling the invalidation methods after every change to a role's
//! grants or a user's role assignment.
//!
//! Each user also has a generation counter. Invalidation bumps it before
//! deleting the entry, and a fill is only stored if the generation it read
//! before building is still current, so a build that raced a write is never
//! cached.

use anyhow::Result;
use common::cache::KeyValueCache;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::AuthorizationContext,
    permissions::aggregate,
    repositories::{RoleStore, UserStore},
};

/// Cache key for a user's context
pub fn context_key(user_id: Uuid) -> String {
    format!("authz:ctx:{}", user_id)
}

/// Cache key for a user's context generation
pub fn generation_key(user_id: Uuid) -> String {
    format!("authz:gen:{}", user_id)
}

/// Authorization context cache
#[derive(Clone)]
pub struct AuthorizationContextCache {
    cache: Arc<dyn KeyValueCache>,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
}

impl AuthorizationContextCache {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        Self {
            cache,
            users,
            roles,
        }
    }

    /// Context for `user_id`, building it on a miss.
    ///
    /// Returns `None` for unknown or inactive users.
    pub async fn get(&self, user_id: Uuid) -> Result<Option<AuthorizationContext>> {
        let key = context_key(user_id);

        if let Some(cached) = self.cache.get(&key).await? {
            match serde_json::from_str::<AuthorizationContext>(&cached) {
                Ok(context) => return Ok(Some(context)),
                Err(e) => warn!(user_id = %user_id, error = %e, "Discarding unreadable cached context"),
            }
        }

        let guard_key = generation_key(user_id);
        let generation = self.cache.counter(&guard_key).await?;

        let Some(context) = self.build(user_id).await? else {
            return Ok(None);
        };

        let stored = self
            .cache
            .set_if_counter(
                &key,
                &serde_json::to_string(&context)?,
                None,
                &guard_key,
                generation,
            )
            .await?;
        if !stored {
            debug!(user_id = %user_id, "Context changed while building, not cached");
        }
        Ok(Some(context))
    }

    /// Build a context from storage, bypassing the cache
    pub async fn build(&self, user_id: Uuid) -> Result<Option<AuthorizationContext>> {
        let user = match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Ok(None),
        };

        let grants = self.roles.grants_for_user(user_id).await?;

        Ok(Some(AuthorizationContext {
            user_id,
            login: user.login,
            employee_id: user.employee_id,
            section_id: user.section_id,
            permissions: aggregate(&grants),
        }))
    }

    /// Drop the cached context of one user
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<()> {
        self.cache.increment(&generation_key(user_id)).await?;
        self.cache.delete(&context_key(user_id)).await
    }

    /// Drop the cached context of every holder of `role_id`
    pub async fn invalidate_role(&self, role_id: Uuid) -> Result<usize> {
        let holders = self.roles.holders_of_role(role_id).await?;

        for user_id in &holders {
            self.invalidate_user(*user_id).await?;
        }

        info!(role_id = %role_id, holders = holders.len(), "Invalidated contexts for role holders");
        Ok(holders.len())
    }
}
