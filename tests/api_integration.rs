//! Management API integration tests.
//!
//! Each test drives the real API router with oneshot requests and checks
//! both the HTTP response and the stored state.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use waypost::api::create_api_router;
use waypost::storage::{SqliteStorage, Storage};

/// Single connection so the in-memory database is shared across queries.
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_link(app: &Router, code: &str, smart_routing: bool) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/links",
            json!({
                "url": "https://example.com",
                "custom_code": code,
                "smart_routing": smart_routing,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

#[tokio::test]
async fn test_create_link_with_custom_code() {
    let storage = create_test_storage().await;
    let app = create_api_router(Arc::clone(&storage));

    let body = create_link(&app, "launch", true).await;
    assert_eq!(body["short_code"], "launch");
    assert_eq!(body["original_url"], "https://example.com");
    assert_eq!(body["is_smart_routing_enabled"], true);
    assert_eq!(body["clicks"], 0);

    assert!(storage.get_link("launch").await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_link_generates_code_when_absent() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);

    let response = app
        .oneshot(json_request(
            "POST",
            "/links",
            json!({"url": "https://example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    let code = body["short_code"].as_str().unwrap();
    assert_eq!(code.len(), 7);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn test_create_link_rejects_empty_url_and_duplicate_code() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/links", json!({"url": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    create_link(&app, "taken", false).await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/links",
            json!({"url": "https://other.example", "custom_code": "taken"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_link_update_and_lifecycle() {
    let storage = create_test_storage().await;
    let app = create_api_router(Arc::clone(&storage));
    create_link(&app, "life", false).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/links/life",
            json!({"smart_routing": true, "default_url": "https://fallback"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["is_smart_routing_enabled"], true);
    assert_eq!(body["default_url"], "https://fallback");
    // Untouched field survives
    assert_eq!(body["original_url"], "https://example.com");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/links/life")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!storage.get_link("life").await.unwrap().unwrap().is_active);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/links/life/activate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(storage.get_link("life").await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn test_unknown_link_operations_not_found() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/links/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            "POST",
            "/links/missing/rules",
            json!({
                "name": "r",
                "target_url": "https://x",
                "priority": 1,
                "conditions": {"operator": "AND", "items": []},
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rule_creation_and_validation() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);
    create_link(&app, "ruled", true).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/links/ruled/rules",
            json!({
                "name": "US mobile",
                "target_url": "https://m.example.com/us",
                "priority": 100,
                "conditions": {
                    "operator": "AND",
                    "items": [
                        {"type": "country", "operator": "equals", "value": "US"},
                        {"type": "device", "operator": "equals", "value": "mobile"},
                    ],
                },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["priority"], 100);
    assert_eq!(body["is_active"], true);
    assert_eq!(body["match_count"], 0);

    // between on a non-temporal field is rejected at write time
    let response = app
        .oneshot(json_request(
            "POST",
            "/links/ruled/rules",
            json!({
                "name": "bad",
                "target_url": "https://x",
                "priority": 1,
                "conditions": {
                    "operator": "AND",
                    "items": [
                        {"type": "country", "operator": "between", "value": {"start": 1, "end": 2}},
                    ],
                },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rule_update_and_delete() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);
    create_link(&app, "rules2", true).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/links/rules2/rules",
            json!({
                "name": "weekend",
                "target_url": "https://weekend.example",
                "priority": 10,
                "conditions": {
                    "operator": "AND",
                    "items": [
                        // Saturday through Sunday, a wrapping window
                        {"type": "day_of_week", "operator": "between", "value": {"start": 6, "end": 0}},
                    ],
                },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let rule_id = response_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/rules/{rule_id}"),
            json!({"priority": 99, "is_active": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["priority"], 99);
    assert_eq!(body["is_active"], false);
    assert_eq!(body["name"], "weekend");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/rules/{rule_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/rules/{rule_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_variant_creation_and_weight_validation() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);
    create_link(&app, "split", false).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/links/split/variants",
            json!({"name": "b", "target_url": "https://b.example", "weight": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let variant_id = response_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/links/split/variants",
            json!({"name": "bad", "target_url": "https://x", "weight": 101}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/variants/{variant_id}"),
            json!({"weight": -1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/links/split/variants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_links_pagination() {
    let storage = create_test_storage().await;
    let app = create_api_router(storage);
    for i in 0..5 {
        create_link(&app, &format!("page{i}"), false).await;
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/links?limit=2&offset=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}
