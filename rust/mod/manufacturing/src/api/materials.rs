use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use garment_core::{ListParams, ListResult, ServiceError};

use super::{AppState, ReasonBody};
use crate::model::{MaterialDispatch, MaterialReceipt, MaterialRequest, MaterialVerification};
use crate::service::{CreateMrn, DispatchInput, MrnFilters, ReceiptInput, VerificationInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mrns", post(create_mrn).get(list_mrns))
        .route("/mrns/{id}", get(get_mrn))
        .route("/mrns/{id}/@dispatch", post(dispatch_mrn))
        .route("/mrns/{id}/@receive", post(receive_mrn))
        .route("/mrns/{id}/@verify", post(verify_mrn))
        .route("/mrns/{id}/@approve", post(approve_mrn))
        .route("/mrns/{id}/@cancel", post(cancel_mrn))
        .route("/mrns/{id}/dispatches", get(list_dispatches))
        .route("/mrns/{id}/receipts", get(list_receipts))
        .route("/mrns/{id}/verifications", get(list_verifications))
}

async fn create_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateMrn>,
) -> Result<Json<MaterialRequest>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:mrn:create")?;
    Ok(Json(s.svc.create_mrn(body, &who)?))
}

async fn list_mrns(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<MrnFilters>,
) -> Result<Json<ListResult<MaterialRequest>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:mrn:read")?;
    Ok(Json(s.svc.list_mrns(&filters, &params)?))
}

async fn get_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MaterialRequest>, ServiceError> {
    s.auth.check(&headers, "manufacturing:mrn:read")?;
    Ok(Json(s.svc.get_mrn(&id)?))
}

async fn dispatch_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DispatchInput>,
) -> Result<Json<MaterialDispatch>, ServiceError> {
    // Dispatch is done by the stores, so it needs an inventory permission.
    let who = s.auth.check(&headers, "inventory:mrn:dispatch")?;
    Ok(Json(s.svc.dispatch_mrn(&id, body, &who)?))
}

async fn receive_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReceiptInput>,
) -> Result<Json<MaterialReceipt>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:mrn:receive")?;
    Ok(Json(s.svc.receive_mrn(&id, body, &who)?))
}

async fn verify_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<VerificationInput>,
) -> Result<Json<MaterialVerification>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:mrn:verify")?;
    Ok(Json(s.svc.verify_mrn(&id, body, &who)?))
}

async fn approve_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MaterialRequest>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:mrn:approve")?;
    Ok(Json(s.svc.approve_mrn(&id, &who)?))
}

async fn cancel_mrn(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<MaterialRequest>, ServiceError> {
    let who = s.auth.check(&headers, "manufacturing:mrn:cancel")?;
    Ok(Json(s.svc.cancel_mrn(&id, &body.reason, &who)?))
}

async fn list_dispatches(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<MaterialDispatch>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:mrn:read")?;
    Ok(Json(s.svc.list_dispatches(&id)?))
}

async fn list_receipts(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<MaterialReceipt>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:mrn:read")?;
    Ok(Json(s.svc.list_receipts(&id)?))
}

async fn list_verifications(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<MaterialVerification>>, ServiceError> {
    s.auth.check(&headers, "manufacturing:mrn:read")?;
    Ok(Json(s.svc.list_verifications(&id)?))
}
