//! User and grant administration without going through the HTTP API.

use anyhow::Result;

use garment_auth::model::{CreateGrant, CreateUser, Grant, Role, User};
use garment_auth::AuthService;
use garment_core::{ListParams, Principal, MAX_LIMIT};

/// Grants made from the CLI are attributed to this actor.
fn operator() -> Principal {
    Principal {
        user_id: "cli".to_string(),
        name: "garment CLI".to_string(),
        roles: vec![],
    }
}

pub fn create_user(svc: &AuthService, input: CreateUser) -> Result<User> {
    let user = svc.create_user(input)?;
    println!("Created user {} ({})", user.username, user.id);
    Ok(user)
}

fn user_id(svc: &AuthService, username: &str) -> Result<String> {
    svc.find_user_by_username(username)?
        .map(|u| u.id)
        .ok_or_else(|| anyhow::anyhow!("no user named \"{username}\""))
}

pub fn grant(svc: &AuthService, username: &str, role_id: &str, expires_at: Option<String>) -> Result<Grant> {
    let grant = svc.grant(
        CreateGrant {
            user_id: user_id(svc, username)?,
            role_id: role_id.to_string(),
            expires_at,
        },
        &operator(),
    )?;
    println!("Granted {role_id} to {username}");
    Ok(grant)
}

pub fn revoke(svc: &AuthService, username: &str, role_id: &str) -> Result<()> {
    svc.revoke_pair(&user_id(svc, username)?, role_id)?;
    println!("Revoked {role_id} from {username}");
    Ok(())
}

pub fn roles(svc: &AuthService) -> Result<Vec<Role>> {
    let params = ListParams { limit: MAX_LIMIT, ..Default::default() };
    let mut roles = svc.list_roles(&params)?.items;
    roles.sort_by(|a, b| a.id.cmp(&b.id));
    println!("{:24} {:8} PERMISSIONS", "ROLE", "BUILTIN");
    for r in &roles {
        println!("{:24} {:8} {}", r.id, if r.builtin { "yes" } else { "" }, r.permissions.join(","));
    }
    Ok(roles)
}
