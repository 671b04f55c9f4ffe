use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::harness::Harness;

#[tokio::test]
async fn clerk_sees_only_what_the_role_allows() {
    let h = Harness::new().await;
    h.item("FAB-TWILL", "FABRIC", "m").await;
    let clerk = h.staff("ravi", "inventory", "inventory:clerk").await;
    let token = Some(clerk.token.as_str());

    let (status, items) = h.call("GET", "/inventory/items", token, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items["total"], 1);

    let (status, err) = h
        .call("POST", "/sales/orders", token, json!({"customerId": "nobody", "lines": []}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["code"], "PERMISSION_DENIED");

    let (status, _) = h.call("GET", "/admin/integrity", token, Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, me) = h.call("GET", "/auth/me", token, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["userId"], clerk.user_id.as_str());
    assert_eq!(me["roles"], json!(["inventory:clerk"]));
    assert!(me["permissions"].as_array().unwrap().contains(&json!("inventory:item:read")));

    // Revocation applies to the token already issued.
    h.ok("DELETE", &format!("/auth/grants/{}", clerk.grant_id), Value::Null).await;
    let (status, _) = h.call("GET", "/inventory/items", token, Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() {
    let h = Harness::new().await;

    let (status, err) = h.call("GET", "/inventory/items", None, Value::Null).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["code"], "UNAUTHENTICATED");

    let (status, _) = h.call("GET", "/inventory/items", Some("not-a-jwt"), Value::Null).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .call("POST", "/auth/login", None, json!({"username": "root", "password": "wrong"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.call("GET", "/health", None, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
}
