use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use garment_core::{ListParams, ListResult, ServiceError};

use super::{AppState, ReasonBody};
use crate::model::PurchaseOrder;
use crate::service::{CreatePurchaseOrder, PoFilters, UpdatePurchaseOrder};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders", post(create_po).get(list_pos))
        .route("/purchase-orders/{id}", get(get_po).patch(update_po))
        .route("/purchase-orders/{id}/@submit", post(submit_po))
        .route("/purchase-orders/{id}/@approve", post(approve_po))
        .route("/purchase-orders/{id}/@send", post(send_po))
        .route("/purchase-orders/{id}/@cancel", post(cancel_po))
        .route("/purchase-orders/{id}/@close", post(close_po))
}

async fn create_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePurchaseOrder>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:create")?;
    Ok(Json(s.svc.create_purchase_order(body, &who)?))
}

async fn list_pos(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<PoFilters>,
) -> Result<Json<ListResult<PurchaseOrder>>, ServiceError> {
    s.auth.check(&headers, "procurement:purchase_order:read")?;
    Ok(Json(s.svc.list_purchase_orders(&filters, &params)?))
}

async fn get_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    s.auth.check(&headers, "procurement:purchase_order:read")?;
    Ok(Json(s.svc.get_purchase_order(&id)?))
}

async fn update_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdatePurchaseOrder>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    s.auth.check(&headers, "procurement:purchase_order:update")?;
    Ok(Json(s.svc.update_purchase_order(&id, body)?))
}

async fn submit_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:update")?;
    Ok(Json(s.svc.submit_purchase_order(&id, &who)?))
}

async fn approve_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:approve")?;
    Ok(Json(s.svc.approve_purchase_order(&id, &who)?))
}

async fn send_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:send")?;
    Ok(Json(s.svc.send_purchase_order(&id, &who)?))
}

async fn cancel_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:cancel")?;
    Ok(Json(s.svc.cancel_purchase_order(&id, &body.reason, &who)?))
}

async fn close_po(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PurchaseOrder>, ServiceError> {
    let who = s.auth.check(&headers, "procurement:purchase_order:close")?;
    Ok(Json(s.svc.close_purchase_order(&id, &who)?))
}
