use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{ListParams, ListResult, ServiceError};

use super::{AppState, ReasonBody};
use crate::model::VendorRequest;
use crate::service::RequestFilters;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendor-requests", get(list_requests))
        .route("/vendor-requests/{id}", get(get_request))
        .route("/vendor-requests/{id}/@acknowledge", post(acknowledge))
        .route("/vendor-requests/{id}/@resolve", post(resolve))
        .route("/vendor-requests/{id}/@cancel", post(cancel))
}

#[derive(Deserialize, Default)]
struct ResolveBody {
    #[serde(default)]
    note: Option<String>,
}

async fn list_requests(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<RequestFilters>,
) -> Result<Json<ListResult<VendorRequest>>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor_request:read")?;
    Ok(Json(s.svc.list_vendor_requests(&filters, &params)?))
}

async fn get_request(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<VendorRequest>, ServiceError> {
    s.auth.check(&headers, "procurement:vendor_request:read")?;
    Ok(Json(s.svc.get_vendor_request(&id)?))
}

async fn acknowledge(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<VendorRequest>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:vendor_request:update")?;
    Ok(Json(s.svc.acknowledge_vendor_request(&id, &who)?))
}

/// Resolve with replacement material. Credit-note resolution goes through finance.
async fn resolve(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<VendorRequest>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:vendor_request:update")?;
    Ok(Json(s.svc.resolve_with_replacement(&id, body.note, &who)?))
}

async fn cancel(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<VendorRequest>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:vendor_request:cancel")?;
    Ok(Json(s.svc.cancel_vendor_request(&id, &body.reason, &who)?))
}
