use tracing::{info, warn};

use garment_core::{Principal, ServiceError};
use garment_store::{table, Value};

use crate::model::{LoginRequest, LoginResponse, Me, StoredUser};
use crate::password::verify_password;
use crate::schema::USERS;
use crate::service::grants::{active_roles, permissions_of};
use crate::service::AuthService;
use crate::{AuthError, ROOT_ROLE, ROOT_USER};

impl AuthService {
    /// Exchange a username and password for an access token.
    ///
    /// Every failure reads the same to the caller.
    pub fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let outcome = if req.username == ROOT_USER {
            self.login_root(&req.password)
        } else {
            self.login_user(&req.username, &req.password)
        };
        match outcome {
            Ok(resp) => {
                info!(username = %req.username, "login");
                Ok(resp)
            }
            Err(AuthError::Service(e)) => Err(e),
            Err(e) => {
                warn!(username = %req.username, reason = %e, "login rejected");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    fn login_root(&self, password: &str) -> Result<LoginResponse, AuthError> {
        let hash = self.root_password_hash.as_deref().ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }
        self.tokens.issue(ROOT_USER, "Root", vec![ROOT_ROLE.to_string()])
    }

    fn login_user(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let stored: StoredUser =
            table::find_by(self.db.as_ref(), USERS, "username", Value::Text(username.to_string()))?
                .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &stored.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !stored.user.active {
            return Err(AuthError::Inactive);
        }
        let roles = active_roles(self.db.as_ref(), &stored.user.id)?;
        self.tokens.issue(&stored.user.id, &stored.user.display_name, roles)
    }

    /// The caller with its current roles and permissions.
    pub fn me(&self, principal: &Principal) -> Result<Me, ServiceError> {
        if principal.roles.iter().any(|r| r == ROOT_ROLE) {
            return Ok(Me {
                user_id: principal.user_id.clone(),
                name: principal.name.clone(),
                roles: principal.roles.clone(),
                permissions: vec!["*".to_string()],
            });
        }
        let perms = permissions_of(self.db.as_ref(), &principal.roles)?;
        Ok(Me {
            user_id: principal.user_id.clone(),
            name: principal.name.clone(),
            roles: principal.roles.clone(),
            permissions: perms.into_iter().collect(),
        })
    }
}
