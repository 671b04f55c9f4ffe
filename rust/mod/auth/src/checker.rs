//! Bearer-token [`Authenticator`] injected into every department module.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tracing::debug;

use garment_core::{permission_matches, Authenticator, Principal, ServiceError};
use garment_sql::SQLStore;

use crate::service::grants::{active_roles, permissions_of};
use crate::service::users::load;
use crate::token::TokenIssuer;
use crate::{ROOT_ROLE, ROOT_USER};

/// Verifies the JWT, then reloads the user and its grants from the store so
/// deactivation and revocation take effect before the token expires.
pub struct AuthChecker {
    db: Arc<dyn SQLStore>,
    tokens: TokenIssuer,
}

impl AuthChecker {
    pub fn new(db: Arc<dyn SQLStore>, tokens: TokenIssuer) -> Self {
        Self { db, tokens }
    }

    fn bearer(headers: &HeaderMap) -> Result<&str, ServiceError> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))
    }
}

impl Authenticator for AuthChecker {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ServiceError> {
        let claims = self.tokens.verify(Self::bearer(headers)?)?;

        if claims.sub == ROOT_USER {
            if !claims.roles.iter().any(|r| r == ROOT_ROLE) {
                return Err(ServiceError::Unauthorized("malformed root token".into()));
            }
            return Ok(Principal {
                user_id: claims.sub,
                name: claims.name,
                roles: vec![ROOT_ROLE.to_string()],
            });
        }

        let stored = load(self.db.as_ref(), &claims.sub).map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::Unauthorized("unknown user".into()),
            other => other,
        })?;
        if !stored.user.active {
            return Err(ServiceError::Unauthorized("user is deactivated".into()));
        }
        Ok(Principal {
            user_id: stored.user.id,
            name: stored.user.display_name,
            roles: active_roles(self.db.as_ref(), &claims.sub)?,
        })
    }

    fn check(&self, headers: &HeaderMap, permission: &str) -> Result<Principal, ServiceError> {
        let principal = self.authenticate(headers)?;
        if principal.roles.iter().any(|r| r == ROOT_ROLE) {
            return Ok(principal);
        }
        let granted = permissions_of(self.db.as_ref(), &principal.roles)?;
        if granted.iter().any(|p| permission_matches(p, permission)) {
            return Ok(principal);
        }
        debug!(user = %principal.user_id, permission, "permission denied");
        Err(ServiceError::PermissionDenied(format!("requires '{permission}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::model::{CreateGrant, LoginRequest};
    use crate::testing::{service, user, ROOT_PASSWORD};

    fn headers(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        h
    }

    fn login(svc: &crate::AuthService, username: &str, password: &str) -> HeaderMap {
        let resp = svc
            .login(LoginRequest { username: username.into(), password: password.into() })
            .unwrap();
        headers(&resp.access_token)
    }

    #[test]
    fn wildcard_roles_and_denials() {
        let svc = service();
        let u = user(&svc, "asha", Some("sales"));
        svc.grant(
            CreateGrant { user_id: u.id.clone(), role_id: "sales:manager".into(), expires_at: None },
            &Principal::system(),
        )
        .unwrap();
        let checker = svc.checker();
        let h = login(&svc, "asha", "correct horse");

        let p = checker.check(&h, "sales:order:confirm").unwrap();
        assert_eq!(p.user_id, u.id);
        assert!(checker.check(&h, "inventory:item:read").is_ok());
        assert!(matches!(
            checker.check(&h, "procurement:grn:approve"),
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[test]
    fn revocation_and_deactivation_apply_immediately() {
        let svc = service();
        let u = user(&svc, "ravi", Some("inventory"));
        svc.grant(
            CreateGrant { user_id: u.id.clone(), role_id: "inventory:clerk".into(), expires_at: None },
            &Principal::system(),
        )
        .unwrap();
        let checker = svc.checker();
        let h = login(&svc, "ravi", "correct horse");
        assert!(checker.check(&h, "inventory:mrn:dispatch").is_ok());

        svc.revoke_pair(&u.id, "inventory:clerk").unwrap();
        assert!(matches!(
            checker.check(&h, "inventory:mrn:dispatch"),
            Err(ServiceError::PermissionDenied(_))
        ));

        svc.deactivate_user(&u.id).unwrap();
        assert!(matches!(checker.authenticate(&h), Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn missing_or_forged_tokens() {
        let svc = service();
        let checker = svc.checker();
        assert!(matches!(checker.check(&HeaderMap::new(), "x:y:z"), Err(ServiceError::Unauthorized(_))));
        assert!(matches!(checker.authenticate(&headers("garbage")), Err(ServiceError::Unauthorized(_))));

        let forged = crate::token::TokenIssuer::new("other-secret", 60)
            .issue(ROOT_USER, "Root", vec![ROOT_ROLE.into()])
            .unwrap();
        assert!(checker.authenticate(&headers(&forged.access_token)).is_err());
    }

    #[test]
    fn root_bypasses_checks() {
        let svc = service();
        let h = login(&svc, "root", ROOT_PASSWORD);
        let p = svc.checker().check(&h, "finance:credit_note:issue").unwrap();
        assert_eq!(p.user_id, ROOT_USER);
    }
}
