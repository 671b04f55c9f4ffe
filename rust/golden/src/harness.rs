use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use garment_auth::password::hash_password;
use garment_auth::AuthConfig;
use garment_sql::SqliteStore;
use garmentd::{build_router, registry};

pub const ROOT_PASSWORD: &str = "golden-root-pw";

/// The whole server over an in-memory store, plus a root token.
pub struct Harness {
    app: Router,
    pub root: String,
}

impl Harness {
    pub async fn new() -> Self {
        let db = SqliteStore::open_in_memory().unwrap();
        registry::migrate_all(&db).unwrap();
        let app = build_router(
            Arc::new(db),
            AuthConfig {
                jwt_secret: "golden-secret".into(),
                expire_secs: 600,
                root_password_hash: Some(hash_password(ROOT_PASSWORD).unwrap()),
            },
        );
        let mut h = Self { app, root: String::new() };
        h.root = h.login("root", ROOT_PASSWORD).await;
        h
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        let resp = self
            .app
            .clone()
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Call as root and insist on 200.
    pub async fn ok(&self, method: &str, uri: &str, body: Value) -> Value {
        let (status, out) = self.call(method, uri, Some(&self.root), body).await;
        assert_eq!(status, StatusCode::OK, "{method} {uri} -> {out}");
        out
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .call("POST", "/auth/login", None, json!({"username": username, "password": password}))
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// A user in `department` holding `role`, logged in.
    pub async fn staff(&self, username: &str, department: &str, role: &str) -> Staff {
        let user = self
            .ok(
                "POST",
                "/auth/users",
                json!({
                    "username": username,
                    "displayName": username,
                    "password": "staff-password",
                    "department": department
                }),
            )
            .await;
        let user_id = id(&user);
        let grant = self.ok("POST", "/auth/grants", json!({"userId": user_id, "roleId": role})).await;
        Staff {
            user_id,
            grant_id: id(&grant),
            token: self.login(username, "staff-password").await,
        }
    }

    pub async fn item(&self, code: &str, category: &str, uom: &str) -> String {
        let item = self
            .ok(
                "POST",
                "/inventory/items",
                json!({"code": code, "name": code, "category": category, "uom": uom}),
            )
            .await;
        id(&item)
    }

    pub async fn on_hand(&self, item_id: &str) -> Decimal {
        let stock = self.ok("GET", &format!("/inventory/items/{item_id}/stock"), Value::Null).await;
        dec(&stock["total"])
    }
}

pub struct Staff {
    pub user_id: String,
    pub grant_id: String,
    pub token: String,
}

pub fn id(v: &Value) -> String {
    v["id"].as_str().unwrap().to_string()
}

/// Decimals travel as strings.
pub fn dec(v: &Value) -> Decimal {
    match v {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}
