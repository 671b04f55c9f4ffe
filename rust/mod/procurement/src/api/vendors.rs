use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use garment_core::{ListParams, ListResult, ServiceError};

use super::AppState;
use crate::model::Vendor;
use crate::service::{CreateVendor, VendorFilters};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendors", post(create_vendor).get(list_vendors))
        .route("/vendors/{id}", get(get_vendor).patch(update_vendor).delete(delete_vendor))
}

async fn create_vendor(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateVendor>,
) -> Result<Json<Vendor>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor:create")?;
    Ok(Json(s.svc.create_vendor(body)?))
}

async fn list_vendors(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<VendorFilters>,
) -> Result<Json<ListResult<Vendor>>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor:read")?;
    Ok(Json(s.svc.list_vendors(&filters, &params)?))
}

async fn get_vendor(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vendor>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor:read")?;
    Ok(Json(s.svc.get_vendor(&id)?))
}

async fn update_vendor(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Vendor>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor:update")?;
    Ok(Json(s.svc.update_vendor(&id, patch)?))
}

async fn delete_vendor(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor:delete")?;
    s.svc.delete_vendor(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
