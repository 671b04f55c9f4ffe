use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{ListParams, ListResult, ServiceError};

use super::{AppState, ReasonBody};
use crate::model::{ProductionOrder, ProductionStage};
use crate::service::{CreateProductionOrder, OrderFilters, OutsourceStage, StageOutput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/production-orders", post(create_order).get(list_orders))
        .route("/production-orders/{id}", get(get_order))
        .route("/production-orders/{id}/@hold", post(hold_order))
        .route("/production-orders/{id}/@resume", post(resume_order))
        .route("/production-orders/{id}/@cancel", post(cancel_order))
        .route("/production-orders/{id}/stages", get(list_stages))
        .route("/stages/{id}/@start", post(start_stage))
        .route("/stages/{id}/@complete", post(complete_stage))
        .route("/stages/{id}/@skip", post(skip_stage))
        .route("/stages/{id}/@outsource", post(outsource_stage))
        .route("/stages/{id}/@return", post(return_stage))
}

#[derive(Deserialize, Default)]
struct SkipBody {
    #[serde(default)]
    reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Production orders
// ---------------------------------------------------------------------------

async fn create_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateProductionOrder>,
) -> Result<Json<ProductionOrder>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:production_order:create")?;
    Ok(Json(s.svc.create_production_order(body, &who)?))
}

async fn list_orders(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<OrderFilters>,
) -> Result<Json<ListResult<ProductionOrder>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:production_order:read")?;
    Ok(Json(s.svc.list_production_orders(&filters, &params)?))
}

async fn get_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProductionOrder>, ServiceError> {
    s.auth.check(&headers, "manufacturing:production_order:read")?;
    Ok(Json(s.svc.get_production_order(&id)?))
}

async fn hold_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ProductionOrder>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:production_order:update")?;
    Ok(Json(s.svc.hold_production_order(&id, &body.reason, &who)?))
}

async fn resume_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProductionOrder>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:production_order:update")?;
    Ok(Json(s.svc.resume_production_order(&id, &who)?))
}

async fn cancel_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<ProductionOrder>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:production_order:cancel")?;
    Ok(Json(s.svc.cancel_production_order(&id, &body.reason, &who)?))
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

async fn list_stages(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProductionStage>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:stage:read")?;
    Ok(Json(s.svc.list_stages(&id)?))
}

async fn start_stage(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProductionStage>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:stage:update")?;
    Ok(Json(s.svc.start_stage(&id, &who)?))
}

async fn complete_stage(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StageOutput>,
) -> Result<Json<ProductionStage>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:stage:update")?;
    Ok(Json(s.svc.complete_stage(&id, body, &who)?))
}

async fn skip_stage(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SkipBody>,
) -> Result<Json<ProductionStage>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:stage:update")?;
    Ok(Json(s.svc.skip_stage(&id, body.reason, &who)?))
}

async fn outsource_stage(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<OutsourceStage>,
) -> Result<Json<ProductionStage>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:stage:outsource")?;
    Ok(Json(s.svc.outsource_stage(&id, body, &who)?))
}

async fn return_stage(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StageOutput>,
) -> Result<Json<ProductionStage>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:stage:outsource")?;
    Ok(Json(s.svc.return_outsourced_stage(&id, body, &who)?))
}
