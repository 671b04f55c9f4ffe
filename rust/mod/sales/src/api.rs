use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ListParams, ListResult, ServiceError};

use crate::model::{Customer, SalesOrder, SalesSummary};
use crate::service::{CreateCustomer, CreateSalesOrder, OrderFilters, SalesService, UpdateSalesOrder};

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<SalesService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Sales routes, nested under `/sales`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/customers", post(create_customer).get(list_customers))
        .route("/customers/{id}", get(get_customer).patch(update_customer).delete(delete_customer))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order).patch(update_order))
        .route("/orders/{id}/@confirm", post(confirm_order))
        .route("/orders/{id}/@cancel", post(cancel_order))
        .route("/orders/{id}/@ready", post(ready_order))
        .route("/summary", get(summary))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CustomerQuery {
    active: Option<bool>,
}

async fn create_customer(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCustomer>,
) -> Result<Json<Customer>, ServiceError> {
    s.auth.check(&headers, "sales:customer:create")?;
    Ok(Json(s.svc.create_customer(body)?))
}

async fn list_customers(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(q): Query<CustomerQuery>,
) -> Result<Json<ListResult<Customer>>, ServiceError> {
    s.auth.check(&headers, "sales:customer:read")?;
    Ok(Json(s.svc.list_customers(q.active, &params)?))
}

async fn get_customer(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ServiceError> {
    s.auth.check(&headers, "sales:customer:read")?;
    Ok(Json(s.svc.get_customer(&id)?))
}

async fn update_customer(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Customer>, ServiceError> {
    s.auth.check(&headers, "sales:customer:update")?;
    Ok(Json(s.svc.update_customer(&id, patch)?))
}

async fn delete_customer(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    s.auth.check(&headers, "sales:customer:delete")?;
    s.svc.delete_customer(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CancelBody {
    reason: String,
}

async fn create_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSalesOrder>,
) -> Result<Json<SalesOrder>, ServiceError> {
    let who = s.auth.check(&headers, "sales:order:create")?;
    Ok(Json(s.svc.create_order(body, &who)?))
}

async fn list_orders(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<OrderFilters>,
) -> Result<Json<ListResult<SalesOrder>>, ServiceError> {
    s.auth.check(&headers, "sales:order:read")?;
    Ok(Json(s.svc.list_orders(&filters, &params)?))
}

async fn get_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SalesOrder>, ServiceError> {
    s.auth.check(&headers, "sales:order:read")?;
    Ok(Json(s.svc.get_order(&id)?))
}

async fn update_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateSalesOrder>,
) -> Result<Json<SalesOrder>, ServiceError> {
    s.auth.check(&headers, "sales:order:update")?;
    Ok(Json(s.svc.update_order(&id, body)?))
}

async fn confirm_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SalesOrder>, ServiceError> {
    let who = s.auth.check(&headers, "sales:order:confirm")?;
    Ok(Json(s.svc.confirm(&id, &who)?))
}

async fn cancel_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<SalesOrder>, ServiceError> {
    let who = s.auth.check(&headers, "sales:order:cancel")?;
    Ok(Json(s.svc.cancel(&id, &body.reason, &who)?))
}

async fn ready_order(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SalesOrder>, ServiceError> {
    let who = s.auth.check(&headers, "sales:order:update")?;
    Ok(Json(s.svc.mark_ready_to_ship(&id, &who)?))
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SalesSummary>, ServiceError> {
    s.auth.check(&headers, "sales:order:read")?;
    Ok(Json(s.svc.summary()?))
}
