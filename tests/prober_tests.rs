// tests/prober_tests.rs

mod common;

use chrono::Duration as ChronoDuration;
use common::{provider_config, t0, test_pool};
use cv_keypool::{CredentialStatus, GeminiAdapter, HealthProber, Outcome, ProviderAdapter};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> Arc<dyn ProviderAdapter> {
    Arc::new(GeminiAdapter::new(&provider_config(&server.uri())).unwrap())
}

fn models_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "models": [{ "name": "models/gemini-1.5-flash" }]
    }))
}

fn invalid_key() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT",
            "details": [{ "reason": "API_KEY_INVALID" }]
        }
    }))
}

/// Polls until `check` holds or five seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn successful_probe_marks_credential_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageSize", "1"))
        .and(header("x-goog-api-key", "secret-k1"))
        .respond_with(models_ok())
        .expect(1)
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["k1"]).await;
    pool.report("k1", Outcome::RateLimited).await.unwrap();
    let prober = HealthProber::new(pool.clone(), adapter(&server), Duration::from_secs(3600), Duration::from_secs(2));

    assert_eq!(prober.probe("k1").await.unwrap(), Some(Outcome::Success));

    let record = pool.get("k1").await.unwrap();
    assert_eq!(record.status, CredentialStatus::Healthy);
    assert_eq!(record.cooldown_until, None);
    assert_eq!(record.consecutive_failures, 0);
    assert_eq!(record.last_checked_at, Some(t0()));
    assert_eq!(record.last_success_at, Some(t0()));
}

#[tokio::test]
async fn rejected_key_becomes_invalid_and_is_not_probed_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(invalid_key())
        .expect(1)
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["k1"]).await;
    let prober = HealthProber::new(pool.clone(), adapter(&server), Duration::from_secs(3600), Duration::from_secs(2));

    assert_eq!(prober.probe("k1").await.unwrap(), Some(Outcome::Invalid));
    assert_eq!(pool.get("k1").await.unwrap().status, CredentialStatus::Invalid);

    assert_eq!(prober.probe("k1").await.unwrap(), None);
    assert_eq!(pool.acquire().await.unwrap(), None);
}

#[tokio::test]
async fn rate_limited_probe_applies_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Resource has been exhausted (e.g. check quota)."))
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["k1"]).await;
    let prober = HealthProber::new(pool.clone(), adapter(&server), Duration::from_secs(3600), Duration::from_secs(2));

    assert_eq!(prober.probe("k1").await.unwrap(), Some(Outcome::RateLimited));

    let record = pool.get("k1").await.unwrap();
    assert_eq!(record.status, CredentialStatus::RateLimited);
    assert_eq!(record.cooldown_until, Some(t0() + ChronoDuration::seconds(60)));
    assert_eq!(record.last_checked_at, Some(t0()));
}

#[tokio::test]
async fn overlapping_probe_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(models_ok().set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["k1"]).await;
    let prober = HealthProber::new(pool, adapter(&server), Duration::from_secs(3600), Duration::from_secs(2));

    let (first, second) = tokio::join!(prober.probe("k1"), prober.probe("k1"));
    let mut results = vec![first.unwrap(), second.unwrap()];
    results.sort_by_key(Option::is_some);
    assert_eq!(results, vec![None, Some(Outcome::Success)]);
}

#[tokio::test]
async fn timed_out_probe_counts_as_other_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(models_ok().set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["k1"]).await;
    let prober = HealthProber::new(pool.clone(), adapter(&server), Duration::from_secs(3600), Duration::from_millis(300));

    assert_eq!(prober.probe("k1").await.unwrap(), Some(Outcome::OtherFailure));

    let record = pool.get("k1").await.unwrap();
    assert_eq!(record.status, CredentialStatus::Unknown);
    assert_eq!(record.consecutive_failures, 1);
    assert_eq!(record.last_checked_at, Some(t0()));
}

#[tokio::test]
async fn probe_of_unknown_credential_is_an_error() {
    let server = MockServer::start().await;
    let (pool, _clock) = test_pool(&["k1"]).await;
    let prober = HealthProber::new(pool, adapter(&server), Duration::from_secs(3600), Duration::from_secs(2));

    assert!(prober.probe("missing").await.is_err());
}

#[tokio::test]
async fn scheduled_loop_stops_once_credential_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "secret-bad"))
        .respond_with(invalid_key())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "secret-good"))
        .respond_with(models_ok())
        .mount(&server)
        .await;

    let (pool, _clock) = test_pool(&["good", "bad"]).await;
    let prober = Arc::new(HealthProber::new(
        pool.clone(),
        adapter(&server),
        Duration::from_millis(100),
        Duration::from_secs(2),
    ));
    prober.start();

    let watched = &prober;
    assert!(eventually(move || async move { watched.active_tasks() == 1 }).await);
    assert_eq!(pool.get("bad").await.unwrap().status, CredentialStatus::Invalid);
    assert_eq!(pool.get("good").await.unwrap().status, CredentialStatus::Healthy);

    prober.shutdown();
    assert_eq!(prober.active_tasks(), 0);
}

#[tokio::test]
async fn repeated_call_failures_trigger_an_out_of_band_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(models_ok())
        .mount(&server)
        .await;

    let (pool, clock) = test_pool(&["k1"]).await;
    let prober = Arc::new(HealthProber::new(
        pool.clone(),
        adapter(&server),
        Duration::from_secs(3600),
        Duration::from_secs(2),
    ));
    prober.start();

    // The first scheduled tick fires immediately.
    let records = &pool;
    assert!(eventually(move || async move {
        records.get("k1").await.unwrap().last_checked_at == Some(t0())
    })
    .await);

    clock.advance(ChronoDuration::seconds(30));
    for _ in 0..3 {
        pool.report("k1", Outcome::OtherFailure).await.unwrap();
    }

    let expected = t0() + ChronoDuration::seconds(30);
    assert!(eventually(move || async move {
        records.get("k1").await.unwrap().last_checked_at == Some(expected)
    })
    .await);

    let record = pool.get("k1").await.unwrap();
    assert_eq!(record.status, CredentialStatus::Healthy);
    assert_eq!(record.consecutive_failures, 0);

    prober.shutdown();
}
