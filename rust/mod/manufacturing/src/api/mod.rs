mod materials;
mod production;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ServiceError};

use crate::model::ManufacturingSummary;
use crate::service::ManufacturingService;

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<ManufacturingService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Manufacturing routes, nested under `/manufacturing`.
///
/// - `/production-orders`  orders (`@hold`, `@resume`, `@cancel`) and their `/stages`
/// - `/stages/{id}`        `@start`, `@complete`, `@skip`, `@outsource`, `@return`
/// - `/mrns`               material requests (`@dispatch`, `@receive`, `@verify`, `@approve`, `@cancel`)
/// - `/summary`
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(production::routes())
        .merge(materials::routes())
        .route("/summary", get(summary))
        .with_state(state)
}

#[derive(Deserialize)]
pub(crate) struct ReasonBody {
    pub reason: String,
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ManufacturingSummary>, ServiceError> {
    s.auth.check(&headers, "manufacturing:production_order:read")?;
    Ok(Json(s.svc.summary()?))
}
