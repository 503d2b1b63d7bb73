//! Admin HTTP surface: create-then-fetch and token lifecycle scenarios.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use proxy_gateway::access_log::AccessLogRecorder;
use proxy_gateway::auth::LogAuthenticator;
use proxy_gateway::http::{self, AppState};
use proxy_gateway::persistence::PersistenceLayer;

async fn test_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::mem::forget(dir);
    let (persistence, store) = PersistenceLayer::load(&path, 10).await.unwrap();
    AppState {
        store: Arc::new(store),
        persistence: Arc::new(persistence),
        logs: Arc::new(AccessLogRecorder::new(100, proxy_gateway::access_log::DEFAULT_MAX_MEMORY_BYTES)),
        auth: Arc::new(LogAuthenticator::new("irrelevant-secret".into()).unwrap()),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn scenario_1_create_then_fetch() {
    let router = http::router(test_state().await);

    let create = Request::builder()
        .method("POST")
        .uri("/config/proxy")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "name": "gh",
                "target_url": "https://api.github.com",
                "protocol": "https",
                "enabled": true
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    let list = Request::builder()
        .uri("/config/proxy?search=gh")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(list).await.unwrap();
    let page = body_json(response).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let get = Request::builder()
        .uri(format!("/config/proxy/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn scenario_2_token_lifecycle() {
    let router = http::router(test_state().await);

    let create_config = Request::builder()
        .method("POST")
        .uri("/config/proxy")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "name": "gh",
                "target_url": "https://api.github.com",
                "protocol": "https"
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create_config).await.unwrap();
    let config = body_json(response).await;
    let config_id = config["id"].as_str().unwrap().to_string();

    let create_token = Request::builder()
        .method("POST")
        .uri(format!("/config/proxy/{config_id}/tokens"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "name": "t1" }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(create_token).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let plaintext = created["plaintext"].as_str().unwrap().to_string();
    let token_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(plaintext.len(), 64);

    let disable = Request::builder()
        .method("PUT")
        .uri(format!("/config/proxy/{config_id}/tokens/{token_id}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "enabled": false }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(disable).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/config/proxy/{config_id}/tokens/{token_id}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
