pub mod grants;
pub mod login;
pub mod roles;
pub mod users;

use std::sync::Arc;

use garment_sql::SQLStore;

use crate::checker::AuthChecker;
use crate::token::TokenIssuer;

pub use users::UserFilters;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime.
    pub expire_secs: u64,
    /// argon2 hash for the `root` login. `None` disables it.
    pub root_password_hash: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "garment-dev-secret-change-me".to_string(),
            expire_secs: 86400,
            root_password_hash: None,
        }
    }
}

pub struct AuthService {
    pub(crate) db: Arc<dyn SQLStore>,
    pub(crate) tokens: TokenIssuer,
    pub(crate) root_password_hash: Option<String>,
}

impl AuthService {
    pub fn new(db: Arc<dyn SQLStore>, config: AuthConfig) -> Self {
        Self {
            db,
            tokens: TokenIssuer::new(&config.jwt_secret, config.expire_secs),
            root_password_hash: config.root_password_hash,
        }
    }

    /// An [`AuthChecker`] verifying tokens issued by this service.
    pub fn checker(&self) -> AuthChecker {
        AuthChecker::new(self.db.clone(), self.tokens.clone())
    }
}
