// tests/admin_tests.rs

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{provider_config, t0, TestConfigBuilder};
use cv_keypool::config::AppConfig;
use cv_keypool::{create_router, AppState, GeminiAdapter, ManualClock, Outcome};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    async fn new(config: AppConfig) -> Self {
        let adapter = Arc::new(GeminiAdapter::new(&provider_config("http://127.0.0.1:1")).unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        let state = Arc::new(AppState::build(&config, adapter, clock).await.unwrap());
        TestApp {
            router: create_router(state.clone()),
            state,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn two_keys() -> TestConfigBuilder {
    TestConfigBuilder::new().with_credential("k1").with_credential("k2")
}

#[tokio::test]
async fn health_reports_eligible_credentials() {
    let app = TestApp::new(two_keys().build()).await;

    let (status, body) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["eligible"], 2);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn health_is_unavailable_when_nothing_is_eligible() {
    let app = TestApp::new(two_keys().build()).await;
    app.state.pool.report("k1", Outcome::Invalid).await.unwrap();
    app.state.pool.report("k2", Outcome::RateLimited).await.unwrap();

    let (status, body) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["eligible"], 0);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn key_listing_hides_secrets() {
    let app = TestApp::new(two_keys().build()).await;
    app.state.pool.report("k2", Outcome::RateLimited).await.unwrap();

    let response = app.router.clone().oneshot(get("/admin/keys")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let raw = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!raw.contains("secret-k1"));
    assert!(!raw.contains("secret-k2"));

    let keys: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(keys[0]["id"], "k1");
    assert_eq!(keys[0]["status"], "unknown");
    assert_eq!(keys[0]["eligible"], true);
    assert_eq!(keys[1]["status"], "rate_limited");
    assert_eq!(keys[1]["eligible"], false);
    assert_eq!(keys[1]["consecutive_failures"], 1);
}

#[tokio::test]
async fn admin_routes_require_configured_token() {
    let app = TestApp::new(two_keys().with_admin_token("admin-secret").build()).await;

    let (status, body) = app.send(get("/admin/keys")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let wrong = Request::builder()
        .uri("/admin/keys")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(wrong).await.0, StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/admin/keys")
        .header(header::AUTHORIZATION, "Bearer admin-secret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(right).await.0, StatusCode::OK);
}

#[tokio::test]
async fn probe_request_accepts_known_ids_only() {
    let app = TestApp::new(two_keys().build()).await;

    let known = Request::builder()
        .method("POST")
        .uri("/admin/keys/k1/probe")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(known).await.0, StatusCode::ACCEPTED);

    let unknown = Request::builder()
        .method("POST")
        .uri("/admin/keys/missing/probe")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(unknown).await.0, StatusCode::NOT_FOUND);
}

#[cfg(feature = "metrics")]
#[tokio::test]
async fn metrics_endpoint_renders_pool_counters() {
    cv_keypool::metrics::init();
    let app = TestApp::new(two_keys().build()).await;
    app.state.pool.acquire().await.unwrap();

    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("keypool_acquire_total"));
}
