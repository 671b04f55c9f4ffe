//! Authentication trait for department modules.
//!
//! Modules do NOT depend on the auth module. They only know this trait.
//! The concrete implementation is injected at startup time.

use axum::http::HeaderMap;
use serde::Serialize;

use crate::ServiceError;

/// The identity a request was authenticated as.
///
/// Recorded as the actor on status history and on documents
/// (`receivedBy`, `approvedBy`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// The identity used by background jobs, the operations CLI and tests.
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            name: "System".to_string(),
            roles: vec![],
        }
    }
}

/// Pluggable authenticator. Every handler calls this with the permission
/// string it needs, e.g. `procurement:grn:approve`.
pub trait Authenticator: Send + Sync + 'static {
    /// Authenticate a request and check the given permission.
    ///
    /// - `headers`: the HTTP request headers
    /// - `permission`: `module:resource:action`
    /// - Returns the caller's [`Principal`] if allowed.
    fn check(&self, headers: &HeaderMap, permission: &str) -> Result<Principal, ServiceError>;

    /// Identify the caller without requiring any permission.
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ServiceError>;
}

/// A no-op authenticator that allows everything as [`Principal::system`].
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn check(&self, _headers: &HeaderMap, _permission: &str) -> Result<Principal, ServiceError> {
        Ok(Principal::system())
    }

    fn authenticate(&self, _headers: &HeaderMap) -> Result<Principal, ServiceError> {
        Ok(Principal::system())
    }
}

/// An authenticator that denies everything. Used for testing.
pub struct DenyAll;

impl Authenticator for DenyAll {
    fn check(&self, _headers: &HeaderMap, permission: &str) -> Result<Principal, ServiceError> {
        Err(ServiceError::PermissionDenied(format!("access denied: {permission}")))
    }

    fn authenticate(&self, _headers: &HeaderMap) -> Result<Principal, ServiceError> {
        Err(ServiceError::Unauthorized("no credentials accepted".into()))
    }
}

/// Check whether a granted permission pattern covers a requested permission.
///
/// Patterns are `:`-separated; a `*` segment matches the rest of the path.
/// `sales:*` covers `sales:order:confirm`, `*` covers everything.
pub fn permission_matches(pattern: &str, permission: &str) -> bool {
    let mut want = permission.split(':');
    for seg in pattern.split(':') {
        if seg == "*" {
            return true;
        }
        match want.next() {
            Some(w) if w == seg => continue,
            _ => return false,
        }
    }
    want.next().is_none()
}
