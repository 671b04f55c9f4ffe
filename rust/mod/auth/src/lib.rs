//! Users, roles and access tokens.
//!
//! A user holds roles through grants; a role is a set of permission
//! patterns (`sales:order:confirm`, `sales:*`, `*`). Login issues an HS256
//! JWT. [`AuthChecker`] verifies it on every request and reloads the user's
//! grants, so revoking a role or deactivating a user takes effect at once.
//!
//! The `root` login is configured outside the store (an argon2 hash in the
//! server config) and always carries [`ROOT_ROLE`].

pub mod api;
pub mod checker;
pub mod model;
pub mod password;
pub mod schema;
pub mod service;
pub mod token;

use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use garment_core::{Module, ServiceError};
use garment_sql::SQLStore;

pub use checker::AuthChecker;
pub use model::{Grant, Role, User};
pub use service::{AuthConfig, AuthService};

/// Role that bypasses every permission check.
pub const ROOT_ROLE: &str = "admin:root";
/// Reserved username for the configured superuser.
pub const ROOT_USER: &str = "root";
/// Departments a user can belong to.
pub const DEPARTMENTS: &[&str] = &["sales", "procurement", "inventory", "manufacturing", "shipment", "finance"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user is deactivated")]
    Inactive,
    #[error("invalid token: {0}")]
    Token(String),
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::Inactive | AuthError::Token(_) => {
                ServiceError::Unauthorized(e.to_string())
            }
            AuthError::WeakPassword(_) => ServiceError::Validation(e.to_string()),
            AuthError::Hash(_) => ServiceError::Internal(e.to_string()),
            AuthError::Service(inner) => inner,
        }
    }
}

pub struct AuthModule {
    service: Arc<AuthService>,
    checker: Arc<AuthChecker>,
}

impl AuthModule {
    pub fn new(db: Arc<dyn SQLStore>, config: AuthConfig) -> Self {
        let service = Arc::new(AuthService::new(db, config));
        let checker = Arc::new(service.checker());
        Self { service, checker }
    }

    /// The authenticator to hand to every other module.
    pub fn checker(&self) -> Arc<AuthChecker> {
        self.checker.clone()
    }

    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }
}

impl Module for AuthModule {
    fn name(&self) -> &str {
        "auth"
    }

    fn routes(&self) -> Router {
        api::router(api::AppState {
            svc: self.service.clone(),
            auth: self.checker.clone(),
        })
    }
}
