use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;

use garment_core::{now_rfc3339, Principal, ServiceError};
use garment_store::{table, Executor, Value};

use crate::model::{grant_id, CreateGrant, Grant, Role};
use crate::schema::{GRANTS, ROLES};
use crate::service::users::load;
use crate::service::AuthService;

impl AuthService {
    /// Grant a role. Granting the same pair again replaces the expiry.
    pub fn grant(&self, input: CreateGrant, actor: &Principal) -> Result<Grant, ServiceError> {
        load(self.db.as_ref(), &input.user_id)?;
        let _: Role = table::get(self.db.as_ref(), ROLES, &input.role_id)?;
        if let Some(exp) = &input.expires_at {
            DateTime::parse_from_rfc3339(exp)
                .map_err(|e| ServiceError::Validation(format!("expiresAt '{exp}' is not RFC 3339: {e}")))?;
        }

        let id = grant_id(&input.user_id, &input.role_id);
        let now = now_rfc3339();
        let existing: Option<Grant> = table::find(self.db.as_ref(), GRANTS, &id)?;
        let grant = Grant {
            id: id.clone(),
            user_id: input.user_id,
            role_id: input.role_id,
            granted_by: actor.user_id.clone(),
            expires_at: input.expires_at,
            created_at: existing.as_ref().map(|g| g.created_at.clone()).unwrap_or_else(|| now.clone()),
            updated_at: now,
        };
        let indexes = [
            ("user_id", Value::Text(grant.user_id.clone())),
            ("role_id", Value::Text(grant.role_id.clone())),
        ];
        if existing.is_some() {
            table::update(self.db.as_ref(), GRANTS, &id, &grant, &indexes)?;
        } else {
            table::insert(self.db.as_ref(), GRANTS, &id, &grant, &indexes)?;
        }
        info!(user = %grant.user_id, role = %grant.role_id, by = %actor.user_id, "role granted");
        Ok(grant)
    }

    pub fn revoke(&self, id: &str) -> Result<(), ServiceError> {
        table::delete(self.db.as_ref(), GRANTS, id)?;
        info!(grant = id, "grant revoked");
        Ok(())
    }

    pub fn revoke_pair(&self, user_id: &str, role_id: &str) -> Result<(), ServiceError> {
        self.revoke(&grant_id(user_id, role_id))
    }

    pub fn grants_for_user(&self, user_id: &str) -> Result<Vec<Grant>, ServiceError> {
        table::select(self.db.as_ref(), GRANTS, &[("user_id", Value::Text(user_id.to_string()))])
    }

    /// Union of the permissions of every unexpired role the user holds.
    pub fn effective_permissions(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        load(self.db.as_ref(), user_id)?;
        let roles = active_roles(self.db.as_ref(), user_id)?;
        Ok(permissions_of(self.db.as_ref(), &roles)?.into_iter().collect())
    }
}

/// Role ids of the user's grants that have not expired.
pub fn active_roles<E>(db: &E, user_id: &str) -> Result<Vec<String>, ServiceError>
where
    E: Executor + ?Sized,
{
    let now = Utc::now();
    let grants: Vec<Grant> = table::select(db, GRANTS, &[("user_id", Value::Text(user_id.to_string()))])?;
    Ok(grants
        .into_iter()
        .filter(|g| match &g.expires_at {
            Some(exp) => DateTime::parse_from_rfc3339(exp).map(|t| t > now).unwrap_or(false),
            None => true,
        })
        .map(|g| g.role_id)
        .collect())
}

/// Sorted, deduplicated permissions of the given roles. Unknown roles are skipped.
pub fn permissions_of<E>(db: &E, role_ids: &[String]) -> Result<BTreeSet<String>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut perms = BTreeSet::new();
    for id in role_ids {
        if let Some(role) = table::find::<_, Role>(db, ROLES, id)? {
            perms.extend(role.permissions);
        }
    }
    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{service, user};

    #[test]
    fn grant_is_idempotent_per_pair() {
        let svc = service();
        let u = user(&svc, "asha", Some("sales"));
        let input = || CreateGrant { user_id: u.id.clone(), role_id: "sales:clerk".into(), expires_at: None };
        let first = svc.grant(input(), &Principal::system()).unwrap();
        let second = svc.grant(input(), &Principal::system()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(svc.grants_for_user(&u.id).unwrap().len(), 1);

        svc.revoke_pair(&u.id, "sales:clerk").unwrap();
        assert!(svc.grants_for_user(&u.id).unwrap().is_empty());
        assert!(matches!(svc.revoke(&first.id), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn grant_needs_user_and_role() {
        let svc = service();
        let u = user(&svc, "asha", None);
        let no_role = svc.grant(
            CreateGrant { user_id: u.id.clone(), role_id: "sales:boss".into(), expires_at: None },
            &Principal::system(),
        );
        assert!(matches!(no_role, Err(ServiceError::NotFound(_))));
        let no_user = svc.grant(
            CreateGrant { user_id: "ghost".into(), role_id: "sales:clerk".into(), expires_at: None },
            &Principal::system(),
        );
        assert!(matches!(no_user, Err(ServiceError::NotFound(_))));
        let bad_expiry = svc.grant(
            CreateGrant { user_id: u.id, role_id: "sales:clerk".into(), expires_at: Some("tomorrow".into()) },
            &Principal::system(),
        );
        assert!(matches!(bad_expiry, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn expired_grants_do_not_count() {
        let svc = service();
        let u = user(&svc, "ravi", Some("inventory"));
        svc.grant(
            CreateGrant { user_id: u.id.clone(), role_id: "inventory:clerk".into(), expires_at: None },
            &Principal::system(),
        )
        .unwrap();
        svc.grant(
            CreateGrant {
                user_id: u.id.clone(),
                role_id: "sales:manager".into(),
                expires_at: Some("2000-01-01T00:00:00Z".into()),
            },
            &Principal::system(),
        )
        .unwrap();

        assert_eq!(active_roles(svc.db.as_ref(), &u.id).unwrap(), vec!["inventory:clerk".to_string()]);
        let perms = svc.effective_permissions(&u.id).unwrap();
        assert!(perms.contains(&"inventory:mrn:dispatch".to_string()));
        assert!(!perms.iter().any(|p| p.starts_with("sales:")));
        let mut sorted = perms.clone();
        sorted.sort();
        assert_eq!(perms, sorted);
    }
}
