use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{ListParams, ListResult, ServiceError};

use super::{AppState, ReasonBody};
use crate::model::{GoodsReceiptNote, OverageDecision};
use crate::service::{CreateGrn, GrnFilters, GrnLineInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/grns", post(create_grn).get(list_grns))
        .route("/grns/{id}", get(get_grn))
        .route("/grns/{id}/lines", post(update_lines))
        .route("/grns/{id}/@receive", post(receive_grn))
        .route("/grns/{id}/@verify", post(verify_grn))
        .route("/grns/{id}/@approve", post(approve_grn))
        .route("/grns/{id}/@reject", post(reject_grn))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    #[serde(default)]
    overage_decision: Option<OverageDecision>,
}

async fn create_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateGrn>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:grn:create")?;
    Ok(Json(s.svc.create_grn(body, &who)?))
}

async fn list_grns(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<GrnFilters>,
) -> Result<Json<ListResult<GoodsReceiptNote>>, ServiceError> {
    s.auth.check(&headers, "procurement:grn:read")?;
    Ok(Json(s.svc.list_grns(&filters, &params)?))
}

async fn get_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    s.auth.check(&headers, "procurement:grn:read")?;
    Ok(Json(s.svc.get_grn(&id)?))
}

async fn update_lines(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(lines): Json<Vec<GrnLineInput>>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    s.auth.check(&headers, "procurement:grn:create")?;
    Ok(Json(s.svc.update_grn_lines(&id, lines)?))
}

async fn receive_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:grn:receive")?;
    Ok(Json(s.svc.receive_grn(&id, &who)?))
}

async fn verify_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:grn:verify")?;
    Ok(Json(s.svc.verify_grn(&id, &who)?))
}

async fn approve_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:grn:approve")?;
    Ok(Json(s.svc.approve_grn(&id, body.overage_decision, &who)?))
}

async fn reject_grn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<GoodsReceiptNote>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:grn:reject")?;
    Ok(Json(s.svc.reject_grn(&id, &body.reason, &who)?))
}
