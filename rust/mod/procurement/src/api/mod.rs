mod grns;
mod purchase_orders;
mod vendor_requests;
mod vendors;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ServiceError};

use crate::model::ProcurementSummary;
use crate::service::ProcurementService;

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<ProcurementService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Procurement routes, nested under `/procurement`.
///
/// - `/vendors`            vendor master data
/// - `/purchase-orders`    PO lifecycle (`@submit`, `@approve`, `@send`, `@cancel`, `@close`)
/// - `/grns`               goods receipts (`@receive`, `@verify`, `@approve`, `@reject`)
/// - `/vendor-requests`    shortage and return follow-ups (`@acknowledge`, `@resolve`, `@cancel`)
/// - `/summary`
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(vendors::routes())
        .merge(purchase_orders::routes())
        .merge(grns::routes())
        .merge(vendor_requests::routes())
        .route("/summary", get(summary))
        .with_state(state)
}

/// Body of every `@cancel` / `@reject` action.
#[derive(Deserialize)]
pub(crate) struct ReasonBody {
    pub reason: String,
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProcurementSummary>, ServiceError> {
    s.auth.check(&headers, "procurement:purchase_order:read")?;
    Ok(Json(s.svc.summary()?))
}
