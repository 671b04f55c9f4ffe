use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use garment_core::{Authenticator, ListParams, ListResult, ServiceError};

use crate::model::*;
use crate::service::{AdjustStock, CreateItem, InventoryService, ItemFilters, MovementFilters, TransferStock};

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<InventoryService>,
    pub auth: Arc<dyn Authenticator>,
}

/// Inventory routes, nested under `/inventory`.
///
/// - `POST/GET          /items`
/// - `GET/PATCH/DELETE  /items/{id}`
/// - `GET               /items/{id}/stock`
/// - `GET               /balances`
/// - `GET               /movements`
/// - `POST              /adjustments`
/// - `POST              /transfers`
/// - `GET               /low-stock`
/// - `GET               /summary`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/{id}", get(get_item).patch(update_item).delete(delete_item))
        .route("/items/{id}/stock", get(item_stock))
        .route("/balances", get(list_balances))
        .route("/movements", get(list_movements))
        .route("/adjustments", post(adjust))
        .route("/transfers", post(transfer))
        .route("/low-stock", get(low_stock))
        .route("/summary", get(summary))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

async fn create_item(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateItem>,
) -> Result<Json<Item>, ServiceError> {
    s.auth.check(&headers, "inventory:item:create")?;
    Ok(Json(s.svc.create_item(body)?))
}

async fn list_items(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<ItemFilters>,
) -> Result<Json<ListResult<Item>>, ServiceError> {
    s.auth.check(&headers, "inventory:item:read")?;
    Ok(Json(s.svc.list_items(&filters, &params)?))
}

async fn get_item(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Item>, ServiceError> {
    s.auth.check(&headers, "inventory:item:read")?;
    Ok(Json(s.svc.get_item(&id)?))
}

async fn update_item(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Item>, ServiceError> {
    s.auth.check(&headers, "inventory:item:update")?;
    Ok(Json(s.svc.update_item(&id, patch)?))
}

async fn delete_item(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    s.auth.check(&headers, "inventory:item:delete")?;
    s.svc.delete_item(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn item_stock(
    State(s): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ItemStock>, ServiceError> {
    s.auth.check(&headers, "inventory:stock:read")?;
    Ok(Json(s.svc.item_stock(&id)?))
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BalanceQuery {
    location: Option<String>,
}

async fn list_balances(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(q): Query<BalanceQuery>,
) -> Result<Json<ListResult<StockBalance>>, ServiceError> {
    s.auth.check(&headers, "inventory:stock:read")?;
    Ok(Json(s.svc.list_balances(q.location.as_deref(), &params)?))
}

async fn list_movements(
    State(s): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Query(filters): Query<MovementFilters>,
) -> Result<Json<ListResult<StockMovement>>, ServiceError> {
    s.auth.check(&headers, "inventory:stock:read")?;
    Ok(Json(s.svc.list_movements(&filters, &params)?))
}

async fn adjust(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdjustStock>,
) -> Result<Json<StockMovement>, ServiceError> {
    let who = s.auth.check(&headers, "inventory:stock:adjust")?;
    Ok(Json(s.svc.adjust(body, &who)?))
}

async fn transfer(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TransferStock>,
) -> Result<Json<Vec<StockMovement>>, ServiceError> {
    let who = s.auth.check(&headers, "inventory:stock:transfer")?;
    Ok(Json(s.svc.transfer(body, &who)?))
}

async fn low_stock(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<LowStockLine>>, ServiceError> {
    s.auth.check(&headers, "inventory:stock:read")?;
    Ok(Json(s.svc.low_stock()?))
}

async fn summary(
    State(s): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<InventorySummary>, ServiceError> {
    s.auth.check(&headers, "inventory:stock:read")?;
    Ok(Json(s.svc.summary()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::store;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use garment_core::{AllowAll, DenyAll};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(auth: Arc<dyn Authenticator>) -> Router {
        router(AppState {
            svc: Arc::new(InventoryService::new(Arc::new(store()))),
            auth,
        })
    }

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
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn create_adjust_and_read_stock() {
        let app = app(Arc::new(AllowAll));
        let (status, item) = send(
            &app,
            "POST",
            "/items",
            serde_json::json!({"code": "FAB-300", "name": "Poplin", "category": "FABRIC", "uom": "m", "reorderLevel": "20"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = item["id"].as_str().unwrap().to_string();

        let (status, mv) = send(
            &app,
            "POST",
            "/adjustments",
            serde_json::json!({"itemId": id, "quantity": 12, "note": "opening stock"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mv["location"], "MAIN");
        assert_eq!(mv["kind"], "ADJUSTMENT");

        let (_, stock) = send(&app, "GET", &format!("/items/{id}/stock"), serde_json::Value::Null).await;
        assert_eq!(stock["total"], "12");

        let (_, low) = send(&app, "GET", "/low-stock", serde_json::Value::Null).await;
        assert_eq!(low.as_array().unwrap().len(), 1);

        let (_, list) = send(&app, "GET", "/movements?kind=ADJUSTMENT&limit=5", serde_json::Value::Null).await;
        assert_eq!(list["total"], 1);
    }

    #[tokio::test]
    async fn overdraw_is_rejected() {
        let app = app(Arc::new(AllowAll));
        let (_, item) = send(
            &app,
            "POST",
            "/items",
            serde_json::json!({"code": "TRM-300", "name": "Button", "category": "TRIM", "uom": "pcs"}),
        )
        .await;
        let (status, err) = send(
            &app,
            "POST",
            "/adjustments",
            serde_json::json!({"itemId": item["id"], "quantity": "-1", "note": "lost"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn permission_is_checked() {
        let app = app(Arc::new(DenyAll));
        let (status, err) = send(&app, "GET", "/items", serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["code"], "PERMISSION_DENIED");
    }
}
