//! Per-request access enforcement
//!
//! The enforcer is a pure decision over an already resolved
//! [`AuthorizationContext`]. On success it hands back the scope the
//! downstream query must be filtered by; applying that filter is the
//! caller's job.

use axum::http::Method;
use serde::Serialize;
use std::borrow::Cow;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{AuthorizationContext, Scope},
};

/// Capabilities an endpoint can demand on top of holding the resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredCapabilities {
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

impl RequiredCapabilities {
    pub const NONE: Self = Self {
        create: false,
        edit: false,
        delete: false,
    };

    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::NONE
        }
    }

    pub fn edit() -> Self {
        Self {
            edit: true,
            ..Self::NONE
        }
    }

    pub fn delete() -> Self {
        Self {
            delete: true,
            ..Self::NONE
        }
    }

    /// Convention by verb: POST creates, PUT/PATCH edit, DELETE deletes,
    /// safe verbs need nothing. Unknown verbs are treated as edits.
    pub fn for_method(method: &Method) -> Self {
        match *method {
            Method::POST => Self::create(),
            Method::PUT | Method::PATCH => Self::edit(),
            Method::DELETE => Self::delete(),
            Method::GET | Method::HEAD | Method::OPTIONS => Self::NONE,
            _ => Self::edit(),
        }
    }
}

/// Resource an endpoint protects, with an optional explicit capability set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequirement {
    pub resource: Cow<'static, str>,
    pub capabilities: Option<RequiredCapabilities>,
}

impl ResourceRequirement {
    /// Capabilities follow the HTTP verb
    pub fn new(resource: impl Into<Cow<'static, str>>) -> Self {
        Self {
            resource: resource.into(),
            capabilities: None,
        }
    }

    /// Capabilities are fixed regardless of the verb
    pub fn with_capabilities(mut self, capabilities: RequiredCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn required_for(&self, method: &Method) -> RequiredCapabilities {
        self.capabilities
            .unwrap_or_else(|| RequiredCapabilities::for_method(method))
    }
}

/// Successful decision, handed to the downstream handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedAccess {
    pub user_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub resource: String,
    pub scope: Scope,
}

/// Decide whether the caller may perform `method` on the required resource
pub fn authorize(
    context: Option<&AuthorizationContext>,
    requirement: &ResourceRequirement,
    method: &Method,
) -> AuthResult<GrantedAccess> {
    let context = context.ok_or(AuthError::Unauthenticated)?;

    let Some(permission) = context.permission(&requirement.resource) else {
        debug!(user_id = %context.user_id, resource = %requirement.resource, "No grant for resource");
        return Err(AuthError::Forbidden);
    };

    let required = requirement.required_for(method);
    let missing = (required.create && !permission.can_create)
        || (required.edit && !permission.can_edit)
        || (required.delete && !permission.can_delete);

    if missing {
        debug!(
            user_id = %context.user_id,
            resource = %requirement.resource,
            method = %method,
            "Missing capability"
        );
        return Err(AuthError::Forbidden);
    }

    Ok(GrantedAccess {
        user_id: context.user_id,
        employee_id: context.employee_id,
        section_id: context.section_id,
        resource: permission.resource.clone(),
        scope: permission.scope,
    })
}
