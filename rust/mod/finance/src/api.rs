use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ListParams, ListResult, ServiceError};

use crate::model::{CreditNote, FinanceSummary};
use crate::service::{CreateCreditNote, CreditNoteFilters, FinanceService};

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<FinanceService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Finance routes, nested under `/finance`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/credit-notes", post(create_credit_note).get(list_credit_notes))
        .route("/credit-notes/from-vendor-request/{id}", post(from_vendor_request))
        .route("/credit-notes/{id}", get(get_credit_note))
        .route("/credit-notes/{id}/@issue", post(issue))
        .route("/credit-notes/{id}/@apply", post(apply))
        .route("/credit-notes/{id}/@cancel", post(cancel))
        .route("/summary", get(summary))
        .with_state(state)
}

#[derive(Deserialize)]
struct ReasonBody {
    reason: String,
}

#[derive(Deserialize, Default)]
struct FromRequestBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn create_credit_note(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCreditNote>,
) -> Result<Json<CreditNote>, ServiceError> {
    let who = s.auth.check(&headers, "finance:credit_note:create")?;
    Ok(Json(s.svc.create_credit_note(body, &who)?))
}

async fn from_vendor_request(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Option<FromRequestBody>>,
) -> Result<Json<CreditNote>, ServiceError> {
    let who = s.auth.check(&headers, "finance:credit_note:create")?;
    let reason = body.unwrap_or_default().reason;
    Ok(Json(s.svc.create_from_vendor_request(&id, reason, &who)?))
}

async fn list_credit_notes(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<CreditNoteFilters>,
) -> Result<Json<ListResult<CreditNote>>, ServiceError> {
    s.auth.check(&headers, "finance:credit_note:read")?;
    Ok(Json(s.svc.list_credit_notes(&filters, &params)?))
}

async fn get_credit_note(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CreditNote>, ServiceError> {
    s.auth.check(&headers, "finance:credit_note:read")?;
    Ok(Json(s.svc.get_credit_note(&id)?))
}

async fn issue(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CreditNote>, ServiceError> {
    let who = s.auth.check(&headers, "finance:credit_note:issue")?;
    Ok(Json(s.svc.issue(&id, &who)?))
}

async fn apply(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CreditNote>, ServiceError> {
    let who = s.auth.check(&headers, "finance:credit_note:apply")?;
    Ok(Json(s.svc.apply(&id, &who)?))
}

async fn cancel(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<CreditNote>, ServiceError> {
    let who = s.auth.check(&headers, "finance:credit_note:cancel")?;
    Ok(Json(s.svc.cancel(&id, &body.reason, &who)?))
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FinanceSummary>, ServiceError> {
    s.auth.check(&headers, "finance:summary:read")?;
    Ok(Json(s.svc.summary()?))
}
