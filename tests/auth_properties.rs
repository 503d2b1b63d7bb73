//! Log-view authenticator properties (spec.md §8, P9/P10) and the
//! "auth loop protection" concrete scenario, driven through the HTTP
//! surface with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use proxy_gateway::access_log::AccessLogRecorder;
use proxy_gateway::auth::LogAuthenticator;
use proxy_gateway::http::{self, AppState};
use proxy_gateway::persistence::PersistenceLayer;

const SECRET: &str = "correctsecret123";

async fn test_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    // Leak the tempdir so it outlives the state built from it, for the
    // lifetime of a single test process.
    std::mem::forget(dir);
    let (persistence, store) = PersistenceLayer::load(&path, 10).await.unwrap();
    AppState {
        store: Arc::new(store),
        persistence: Arc::new(persistence),
        logs: Arc::new(AccessLogRecorder::new(100, proxy_gateway::access_log::DEFAULT_MAX_MEMORY_BYTES)),
        auth: Arc::new(LogAuthenticator::new(SECRET.into()).unwrap()),
    }
}

#[test]
fn p10_cookie_round_trips_and_rejects_garbage() {
    let auth = LogAuthenticator::new(SECRET.into()).unwrap();
    let cookie = auth.encode_cookie().unwrap();

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        header::COOKIE,
        format!("log_auth={cookie}").parse().unwrap(),
    );
    assert!(auth.authenticate(&headers, None, None).is_ok());

    let mut bad_headers = axum::http::HeaderMap::new();
    bad_headers.insert(header::COOKIE, "log_auth=not_a_valid_payload".parse().unwrap());
    assert!(auth.authenticate(&bad_headers, None, None).is_err());
}

#[test]
fn p9_wrong_secret_rejection_time_does_not_grow_with_shared_prefix_length() {
    let auth = LogAuthenticator::new(SECRET.into()).unwrap();

    let near_miss = format!("{}x", &SECRET[..SECRET.len() - 1]); // shares all but last char
    let far_miss = "z".repeat(SECRET.len());

    let time_of = |candidate: &str| {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-log-secret", candidate.parse().unwrap());
        let iterations = 2_000;
        let start = Instant::now();
        for _ in 0..iterations {
            let _ = auth.authenticate(&headers, None, None);
        }
        start.elapsed() / iterations
    };

    let near = time_of(&near_miss);
    let far = time_of(&far_miss);

    // Constant-time comparison: the two should be within the same rough
    // order of magnitude rather than one taking measurably longer, which
    // is all a statistical check run once in CI can responsibly assert.
    let ratio = near.as_secs_f64().max(1e-12) / far.as_secs_f64().max(1e-12);
    assert!(ratio < 5.0 && ratio > 0.2, "suspicious timing ratio: {ratio}");
}

#[tokio::test]
async fn scenario_6_stale_cookie_gets_401_with_clear_auth_header_and_expired_cookie() {
    let state = test_state().await;
    let router = http::router(state);

    let request = Request::builder()
        .uri("/logs")
        .header(header::COOKIE, "log_auth=invalid_old_cookie")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("x-clear-auth-storage")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.contains("Max-Age=-1"));
}

#[tokio::test]
async fn login_then_fetch_logs_succeeds_with_issued_cookie() {
    let state = test_state().await;
    let router = http::router(state);

    let login_request = Request::builder()
        .method("POST")
        .uri("/logs")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("secret={SECRET}")))
        .unwrap();
    let login_response = router.clone().oneshot(login_request).await.unwrap();
    assert_eq!(login_response.status(), StatusCode::OK);
    let cookie = login_response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let follow_up = Request::builder()
        .uri("/logs")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(follow_up).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
