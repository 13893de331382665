//! Per-request context handed to permission checks

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, Method, request::Parts},
};
use denyallow_core::{Identity, RequestInfo};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Identity established by an upstream authentication layer.
///
/// Authentication is not this crate's job: whatever layer verifies the caller
/// inserts a `Principal` into the request extensions, and the guard picks it
/// up from there. A request without one is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user identifier
    pub user_id: String,
    /// Staff member flag
    pub staff: bool,
    /// Superuser flag
    pub superuser: bool,
    /// Application roles
    pub roles: Vec<String>,
}

impl Principal {
    /// Create a principal with no flags or roles
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Mark as staff
    pub fn with_staff(mut self) -> Self {
        self.staff = true;
        self
    }

    /// Mark as superuser
    pub fn with_superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// Add a role
    pub fn with_role<S: Into<String>>(mut self, role: S) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Check if the principal has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// What checks can see about a request
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    headers: HeaderMap,
    principal: Option<Principal>,
}

impl RequestContext {
    /// Create a context from its parts
    pub fn new(method: Method, headers: HeaderMap, principal: Option<Principal>) -> Self {
        Self {
            method,
            headers,
            principal,
        }
    }

    /// Build the context from request parts
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(
            parts.method.clone(),
            parts.headers.clone(),
            parts.extensions.get::<Principal>().cloned(),
        )
    }

    /// Build the context from a full request
    pub fn from_request(request: &Request) -> Self {
        Self::new(
            request.method().clone(),
            request.headers().clone(),
            request.extensions().get::<Principal>().cloned(),
        )
    }

    /// The authenticated caller, if any
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request method
    pub fn http_method(&self) -> &Method {
        &self.method
    }
}

impl Identity for RequestContext {
    fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    fn is_staff(&self) -> bool {
        self.principal.as_ref().is_some_and(|p| p.staff)
    }

    fn is_superuser(&self) -> bool {
        self.principal.as_ref().is_some_and(|p| p.superuser)
    }
}

impl RequestInfo for RequestContext {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
