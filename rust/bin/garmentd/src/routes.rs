//! Route registration: every department module plus system and admin endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use garment_auth::{AuthConfig, AuthModule};
use garment_core::{Authenticator, Module, ServiceError};
use garment_sql::SQLStore;
use garment_store::{history, HistoryEntry, IntegrityReport};

use crate::registry;

#[derive(Clone)]
struct AdminState {
    db: Arc<dyn SQLStore>,
    auth: Arc<dyn Authenticator>,
}

/// Build the complete application over an already migrated store.
pub fn build_router(db: Arc<dyn SQLStore>, auth_config: AuthConfig) -> Router {
    let auth_module = AuthModule::new(db.clone(), auth_config);
    let auth: Arc<dyn Authenticator> = auth_module.checker();

    let modules: Vec<Box<dyn Module>> = vec![
        Box::new(auth_module),
        Box::new(garment_inventory::InventoryModule::new(db.clone(), auth.clone())),
        Box::new(garment_sales::SalesModule::new(db.clone(), auth.clone())),
        Box::new(garment_procurement::ProcurementModule::new(db.clone(), auth.clone())),
        Box::new(garment_manufacturing::ManufacturingModule::new(db.clone(), auth.clone())),
        Box::new(garment_shipment::ShipmentModule::new(db.clone(), auth.clone())),
        Box::new(garment_finance::FinanceModule::new(db.clone(), auth.clone())),
    ];

    let admin = Router::new()
        .route("/integrity", get(integrity))
        .route("/history", get(status_history))
        .with_state(AdminState { db, auth });

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .nest("/admin", admin);

    for module in &modules {
        info!(module = module.name(), "mounted");
        app = app.nest(&format!("/{}", module.name()), module.routes());
    }

    app.layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "garmentd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn integrity(State(s): State<AdminState>, headers: HeaderMap) -> Result<Json<IntegrityReport>, ServiceError> {
    s.auth.check(&headers, "admin:integrity:read")?;
    Ok(Json(registry::integrity_report(s.db.as_ref())?))
}

#[derive(Deserialize)]
struct HistoryQuery {
    entity: String,
    id: String,
}

async fn status_history(
    State(s): State<AdminState>,
    headers: HeaderMap,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ServiceError> {
    s.auth.check(&headers, "admin:history:read")?;
    Ok(Json(history::list(s.db.as_ref(), &q.entity, &q.id)?))
}
