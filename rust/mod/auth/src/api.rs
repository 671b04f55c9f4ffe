use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ListParams, ListResult, ServiceError};

use crate::model::{
    CreateGrant, CreateRole, CreateUser, Grant, LoginRequest, LoginResponse, Me, Role, UpdateRole, UpdateUser, User,
};
use crate::service::{AuthService, UserFilters};

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<AuthService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Auth routes, nested under `/auth`. `/login` is the only public route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/users", post(create_user).get(list_users))
        .route("/users/{id}", get(get_user).patch(update_user))
        .route("/users/{id}/@deactivate", post(deactivate_user))
        .route("/users/{id}/@password", post(set_password))
        .route("/users/{id}/grants", get(user_grants))
        .route("/users/{id}/permissions", get(user_permissions))
        .route("/roles", post(create_role).get(list_roles))
        .route("/roles/{id}", get(get_role).patch(update_role).delete(delete_role))
        .route("/grants", post(grant))
        .route("/grants/{id}", delete(revoke))
        .with_state(state)
}

// ---- session ----

async fn login(
    State(s): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    Ok(Json(s.svc.login(body)?))
}

async fn me(State(s): State<AppState>, headers: HeaderMap) -> Result<Json<Me>, ServiceError> {
    let who = s.auth.authenticate(&headers)?;
    Ok(Json(s.svc.me(&who)?))
}

// ---- users ----

#[derive(Deserialize)]
struct PasswordBody {
    password: String,
}

async fn create_user(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateUser>,
) -> Result<Json<User>, ServiceError> {
    s.auth.check(&headers, "auth:user:create")?;
    Ok(Json(s.svc.create_user(body)?))
}

async fn list_users(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<UserFilters>,
) -> Result<Json<ListResult<User>>, ServiceError> {
    s.auth.check(&headers, "auth:user:read")?;
    Ok(Json(s.svc.list_users(&filters, &params)?))
}

async fn get_user(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    s.auth.check(&headers, "auth:user:read")?;
    Ok(Json(s.svc.get_user(&id)?))
}

async fn update_user(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateUser>,
) -> Result<Json<User>, ServiceError> {
    s.auth.check(&headers, "auth:user:update")?;
    Ok(Json(s.svc.update_user(&id, body)?))
}

async fn deactivate_user(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    s.auth.check(&headers, "auth:user:update")?;
    Ok(Json(s.svc.deactivate_user(&id)?))
}

/// Users may change their own password; anyone else needs `auth:user:update`.
async fn set_password(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PasswordBody>,
) -> Result<Json<User>, ServiceError> {
    let who = s.auth.authenticate(&headers)?;
    if who.user_id != id {
        s.auth.check(&headers, "auth:user:update")?;
    }
    Ok(Json(s.svc.set_password(&id, &body.password)?))
}

async fn user_grants(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Grant>>, ServiceError> {
    s.auth.check(&headers, "auth:grant:read")?;
    Ok(Json(s.svc.grants_for_user(&id)?))
}

async fn user_permissions(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ServiceError> {
    s.auth.check(&headers, "auth:grant:read")?;
    Ok(Json(s.svc.effective_permissions(&id)?))
}

// ---- roles ----

async fn create_role(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRole>,
) -> Result<Json<Role>, ServiceError> {
    s.auth.check(&headers, "auth:role:create")?;
    Ok(Json(s.svc.create_role(body)?))
}

async fn list_roles(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Role>>, ServiceError> {
    s.auth.check(&headers, "auth:role:read")?;
    Ok(Json(s.svc.list_roles(&params)?))
}

async fn get_role(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Role>, ServiceError> {
    s.auth.check(&headers, "auth:role:read")?;
    Ok(Json(s.svc.get_role(&id)?))
}

async fn update_role(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateRole>,
) -> Result<Json<Role>, ServiceError> {
    s.auth.check(&headers, "auth:role:update")?;
    Ok(Json(s.svc.update_role(&id, body)?))
}

async fn delete_role(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    s.auth.check(&headers, "auth:role:delete")?;
    s.svc.delete_role(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---- grants ----

async fn grant(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateGrant>,
) -> Result<Json<Grant>, ServiceError> {
    let who = s.auth.check(&headers, "auth:grant:create")?;
    Ok(Json(s.svc.grant(body, &who)?))
}

async fn revoke(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    s.auth.check(&headers, "auth:grant:delete")?;
    s.svc.revoke(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
