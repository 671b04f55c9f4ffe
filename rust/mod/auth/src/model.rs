use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A person who can log in. The password hash lives only in [`StoredUser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// The persisted user document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub username: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// A named permission set.
///
/// Permission strings are `module:resource:action`; a `*` segment covers
/// the rest of the path (`sales:*`, `*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// e.g. `sales:manager`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub builtin: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRole {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// A role held by a user. Same (user, role) pair, same id: granting again
/// refreshes the expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub id: String,
    pub user_id: String,
    pub role_id: String,
    pub granted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGrant {
    pub user_id: String,
    pub role_id: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// The caller as seen by `GET /auth/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    pub user_id: String,
    pub name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Deterministic grant id: hex(sha256(user ":" role)), first 32 chars.
pub fn grant_id(user_id: &str, role_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(role_id.as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_id_is_stable() {
        let a = grant_id("u1", "sales:clerk");
        assert_eq!(a, grant_id("u1", "sales:clerk"));
        assert_eq!(a.len(), 32);
        assert_ne!(a, grant_id("u2", "sales:clerk"));
    }

    #[test]
    fn stored_user_keeps_hash_out_of_the_public_view() {
        let stored = StoredUser {
            user: User {
                id: "u1".into(),
                username: "asha".into(),
                display_name: "Asha".into(),
                department: Some("sales".into()),
                email: None,
                active: true,
                created_at: "t".into(),
                updated_at: "t".into(),
            },
            password_hash: "$argon2id$...".into(),
        };
        let doc = serde_json::to_value(&stored).unwrap();
        assert_eq!(doc["passwordHash"], "$argon2id$...");
        assert_eq!(doc["displayName"], "Asha");
        let public = serde_json::to_value(&stored.user).unwrap();
        assert!(public.get("passwordHash").is_none());
    }
}
