use serde::Deserialize;
use tracing::info;

use garment_core::{ensure_not_blank, new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use garment_store::{table, Executor, Value};

use crate::model::{CreateUser, StoredUser, UpdateUser, User};
use crate::password::hash_password;
use crate::schema::USERS;
use crate::service::AuthService;
use crate::{DEPARTMENTS, ROOT_USER};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilters {
    pub active: Option<bool>,
    pub department: Option<String>,
}

impl AuthService {
    pub fn create_user(&self, input: CreateUser) -> Result<User, ServiceError> {
        let username = input.username.trim().to_string();
        ensure_not_blank("username", &username)?;
        if username.chars().any(char::is_whitespace) {
            return Err(ServiceError::Validation("username cannot contain whitespace".into()));
        }
        if username.eq_ignore_ascii_case(ROOT_USER) {
            return Err(ServiceError::Validation(format!("username '{ROOT_USER}' is reserved")));
        }
        ensure_not_blank("displayName", &input.display_name)?;
        check_department(input.department.as_deref())?;

        let now = now_rfc3339();
        let stored = StoredUser {
            user: User {
                id: new_id(),
                username,
                display_name: input.display_name,
                department: input.department,
                email: input.email,
                active: true,
                created_at: now.clone(),
                updated_at: now,
            },
            password_hash: hash_password(&input.password)?,
        };
        table::insert(self.db.as_ref(), USERS, &stored.user.id, &stored, &user_indexes(&stored.user))?;
        info!(username = %stored.user.username, "user created");
        Ok(stored.user)
    }

    pub fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        load(self.db.as_ref(), id).map(|s| s.user)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let found: Option<StoredUser> =
            table::find_by(self.db.as_ref(), USERS, "username", Value::Text(username.to_string()))?;
        Ok(found.map(|s| s.user))
    }

    pub fn list_users(&self, filters: &UserFilters, params: &ListParams) -> Result<ListResult<User>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(active) = filters.active {
            conds.push(("active", Value::Integer(active as i64)));
        }
        if let Some(dept) = &filters.department {
            conds.push(("department", Value::Text(dept.clone())));
        }
        let page: ListResult<StoredUser> =
            table::list(self.db.as_ref(), USERS, &conds, &["username", "display_name"], params)?;
        Ok(ListResult {
            items: page.items.into_iter().map(|s| s.user).collect(),
            total: page.total,
        })
    }

    pub fn update_user(&self, id: &str, input: UpdateUser) -> Result<User, ServiceError> {
        let mut stored = load(self.db.as_ref(), id)?;
        if let Some(name) = input.display_name {
            ensure_not_blank("displayName", &name)?;
            stored.user.display_name = name;
        }
        if let Some(dept) = input.department {
            check_department(Some(&dept))?;
            stored.user.department = Some(dept);
        }
        if let Some(email) = input.email {
            stored.user.email = Some(email);
        }
        if let Some(active) = input.active {
            stored.user.active = active;
        }
        save(self.db.as_ref(), &mut stored)?;
        Ok(stored.user)
    }

    /// Users are never deleted; their id stays on documents they touched.
    pub fn deactivate_user(&self, id: &str) -> Result<User, ServiceError> {
        let mut stored = load(self.db.as_ref(), id)?;
        stored.user.active = false;
        save(self.db.as_ref(), &mut stored)?;
        info!(username = %stored.user.username, "user deactivated");
        Ok(stored.user)
    }

    pub fn set_password(&self, id: &str, password: &str) -> Result<User, ServiceError> {
        let mut stored = load(self.db.as_ref(), id)?;
        stored.password_hash = hash_password(password)?;
        save(self.db.as_ref(), &mut stored)?;
        info!(username = %stored.user.username, "password changed");
        Ok(stored.user)
    }
}

pub(crate) fn load<E: Executor + ?Sized>(db: &E, id: &str) -> Result<StoredUser, ServiceError> {
    table::get(db, USERS, id)
}

fn save<E: Executor + ?Sized>(db: &E, stored: &mut StoredUser) -> Result<(), ServiceError> {
    stored.user.updated_at = now_rfc3339();
    table::update(db, USERS, &stored.user.id, &*stored, &user_indexes(&stored.user))
}

fn user_indexes(u: &User) -> Vec<(&'static str, Value)> {
    vec![
        ("username", Value::Text(u.username.clone())),
        ("display_name", Value::Text(u.display_name.clone())),
        ("department", Value::opt_text(u.department.as_deref())),
        ("active", Value::Integer(u.active as i64)),
    ]
}

fn check_department(dept: Option<&str>) -> Result<(), ServiceError> {
    match dept {
        Some(d) if !DEPARTMENTS.contains(&d) => Err(ServiceError::Validation(format!(
            "unknown department '{d}', expected one of {}",
            DEPARTMENTS.join(", ")
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{service, user};
    use garment_core::ServiceError;

    use super::*;

    #[test]
    fn usernames_are_unique_and_root_is_reserved() {
        let svc = service();
        user(&svc, "asha", Some("sales"));
        let dup = svc.create_user(CreateUser {
            username: "asha".into(),
            display_name: "Other Asha".into(),
            password: "long enough".into(),
            department: None,
            email: None,
        });
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));

        let root = svc.create_user(CreateUser {
            username: "Root".into(),
            display_name: "Impostor".into(),
            password: "long enough".into(),
            department: None,
            email: None,
        });
        assert!(matches!(root, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn department_must_be_known() {
        let svc = service();
        let err = svc
            .create_user(CreateUser {
                username: "li".into(),
                display_name: "Li".into(),
                password: "long enough".into(),
                department: Some("marketing".into()),
                email: None,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn update_and_deactivate() {
        let svc = service();
        let u = user(&svc, "ravi", Some("inventory"));
        let updated = svc
            .update_user(&u.id, UpdateUser { display_name: Some("Ravi K".into()), ..Default::default() })
            .unwrap();
        assert_eq!(updated.display_name, "Ravi K");
        assert_eq!(updated.department.as_deref(), Some("inventory"));

        svc.deactivate_user(&u.id).unwrap();
        let active = svc
            .list_users(&UserFilters { active: Some(true), department: None }, &Default::default())
            .unwrap();
        assert_eq!(active.total, 0);
        let by_dept = svc
            .list_users(&UserFilters { active: None, department: Some("inventory".into()) }, &Default::default())
            .unwrap();
        assert_eq!(by_dept.items[0].username, "ravi");
    }
}
