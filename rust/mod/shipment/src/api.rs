use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ListParams, ListResult, ServiceError};

use crate::model::{Shipment, ShipmentSummary};
use crate::service::{CarrierInfo, CreateShipment, ShipmentFilters, ShipmentService};

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<ShipmentService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Shipment routes, nested under `/shipment`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shipments", post(create_shipment).get(list_shipments))
        .route("/shipments/{id}", get(get_shipment))
        .route("/shipments/{id}/@pack", post(pack))
        .route("/shipments/{id}/@dispatch", post(dispatch))
        .route("/shipments/{id}/@in-transit", post(in_transit))
        .route("/shipments/{id}/@deliver", post(deliver))
        .route("/shipments/{id}/@return", post(return_shipment))
        .route("/shipments/{id}/@cancel", post(cancel))
        .route("/summary", get(summary))
        .with_state(state)
}

#[derive(Deserialize)]
struct ReasonBody {
    reason: String,
}

async fn create_shipment(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateShipment>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:create")?;
    Ok(Json(s.svc.create_shipment(body, &who)?))
}

async fn list_shipments(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<ShipmentFilters>,
) -> Result<Json<ListResult<Shipment>>, ServiceError> {
    s.auth.check(&headers, "shipment:shipment:read")?;
    Ok(Json(s.svc.list_shipments(&filters, &params)?))
}

async fn get_shipment(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, ServiceError> {
    s.auth.check(&headers, "shipment:shipment:read")?;
    Ok(Json(s.svc.get_shipment(&id)?))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

async fn pack(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Option<CarrierInfo>>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:update")?;
    let info = body.unwrap_or_default();
    Ok(Json(s.svc.pack(&id, info, &who)?))
}

async fn dispatch(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Option<CarrierInfo>>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:dispatch")?;
    let info = body.unwrap_or_default();
    Ok(Json(s.svc.dispatch(&id, info, &who)?))
}

async fn in_transit(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:update")?;
    Ok(Json(s.svc.mark_in_transit(&id, &who)?))
}

async fn deliver(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:deliver")?;
    Ok(Json(s.svc.deliver(&id, &who)?))
}

async fn return_shipment(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:return")?;
    Ok(Json(s.svc.return_shipment(&id, &body.reason, &who)?))
}

async fn cancel(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Shipment>, ServiceError> {
    let who = s.auth.check(&headers, "shipment:shipment:cancel")?;
    Ok(Json(s.svc.cancel(&id, &body.reason, &who)?))
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ShipmentSummary>, ServiceError> {
    s.auth.check(&headers, "shipment:shipment:read")?;
    Ok(Json(s.svc.summary()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use garment_core::AllowAll;
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn ship_and_deliver_over_http() {
        let f = Fixture::new();
        let so = f.ready_order(&[dec!(25)]);
        let app = router(AppState {
            svc: Arc::new(ShipmentService::new(f.db.clone())),
            auth: Arc::new(AllowAll),
        });

        let (status, err) = send(
            &app,
            "POST",
            "/shipments",
            serde_json::json!({"salesOrderId": so.id, "lines": [{"soLineNo": 2, "quantity": 1}]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_FAILED");

        let (status, shp) = send(
            &app,
            "POST",
            "/shipments",
            serde_json::json!({"salesOrderId": so.id, "lines": [{"soLineNo": 1, "quantity": 25}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shp["status"], "DRAFT");
        assert_eq!(shp["location"], "MAIN");
        let id = shp["id"].as_str().unwrap();

        let (status, _) = send(&app, "POST", &format!("/shipments/{id}/@dispatch"), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, shp) = send(
            &app,
            "POST",
            &format!("/shipments/{id}/@pack"),
            serde_json::json!({"carrier": "BlueDart", "trackingNumber": "BD123"}),
        )
        .await;
        assert_eq!(shp["status"], "PACKED");
        assert_eq!(shp["trackingNumber"], "BD123");

        let (_, shp) = send(&app, "POST", &format!("/shipments/{id}/@dispatch"), serde_json::Value::Null).await;
        assert_eq!(shp["status"], "DISPATCHED");

        let (status, shp) = send(&app, "POST", &format!("/shipments/{id}/@deliver"), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shp["status"], "DELIVERED");

        let (_, list) = send(&app, "GET", &format!("/shipments?salesOrderId={}", so.id), serde_json::Value::Null).await;
        assert_eq!(list["total"], 1);
        let (_, summary) = send(&app, "GET", "/summary", serde_json::Value::Null).await;
        assert_eq!(summary["awaitingDispatch"], 0);
    }
}
