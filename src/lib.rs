// src/lib.rs

pub mod admin;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod key_manager;
pub mod metrics;
pub mod monitoring;
pub mod provider;
pub mod service;
pub mod state;
pub mod storage;

use crate::admin::{health_check, metrics_handler};
use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::AppConfig;
pub use crate::core::Outcome;
pub use crate::error::{AppError, Result};
pub use crate::key_manager::KeyPool;
pub use crate::monitoring::HealthProber;
pub use crate::provider::{GeminiAdapter, GenerateRequest, ProviderAdapter};
pub use crate::service::GenerationService;
pub use crate::state::AppState;
pub use crate::storage::{Credential, CredentialStatus, CredentialStore, InMemoryStore};

/// Operational router: pool health, admin snapshot and metrics.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(admin::admin_routes())
        .with_state(state)
}

/// Adds a request id and a tracing span to every request.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads configuration, builds the pool, starts background work and returns
/// the router with the shared state.
pub async fn run(
    config_path_override: Option<PathBuf>,
) -> Result<(Router, AppConfig, Arc<AppState>)> {
    info!("Starting key pool service...");

    let (app_config, config_path) = setup_configuration(config_path_override)?;

    crate::metrics::init();

    let app_state = Arc::new(AppState::new(&app_config).await.map_err(|e| {
        error!(error = ?e, "Failed to initialize application state. Exiting.");
        e
    })?);
    info!("Application state initialized successfully.");

    if app_config.prober.enabled {
        app_state.prober.start();
    } else {
        warn!("Health prober is disabled; credential health is learned from call outcomes only");
    }

    if let Some(secs) = app_config.refresh_interval_secs.filter(|s| *s > 0) {
        spawn_config_refresh(Arc::clone(&app_state), config_path, Duration::from_secs(secs));
    }

    let app = create_router(Arc::clone(&app_state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(trace_requests)),
    );

    Ok((app, app_config, app_state))
}

/// Loads, validates and logs the configuration.
fn setup_configuration(config_path_override: Option<PathBuf>) -> Result<(AppConfig, PathBuf)> {
    let config_path = config_path_override.unwrap_or_else(|| {
        std::env::var("KEYPOOL_CONFIG").map_or_else(|_| PathBuf::from("config.yaml"), PathBuf::from)
    });

    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(config.path = %config_path_display, "Optional configuration file not found. Using defaults and environment variables.");
    }

    let app_config = config::load_config(&config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;

    let ids: Vec<&str> = app_config.credentials.iter().map(|c| c.id.as_str()).collect();
    info!(
        config.credentials.count = ids.len(),
        config.credentials.ids = ?ids,
        server.port = app_config.server.port,
        "Configuration loaded and validated successfully."
    );

    Ok((app_config, config_path))
}

/// Re-reads the config file on an interval and registers credentials that
/// were not known before. Removed entries stay in the pool.
pub fn spawn_config_refresh(
    state: Arc<AppState>,
    config_path: PathBuf,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Config refresh enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = refresh_credentials(&state, &config_path).await {
                error!(error = %e, "Config refresh failed; keeping current credentials");
            }
        }
    })
}

/// One refresh pass. Returns the number of newly registered credentials.
pub async fn refresh_credentials(state: &AppState, config_path: &Path) -> Result<usize> {
    let fresh = config::load_config(config_path)?;
    let known: HashSet<String> = state.pool.ids().into_iter().collect();

    let added = state.pool.register_all(&fresh.credentials).await?;
    if added > 0 {
        info!(added, "Registered new credentials from config refresh");
        if state.config.prober.enabled {
            for credential in fresh.credentials.iter().filter(|c| !known.contains(&c.id)) {
                state.prober.watch(&credential.id);
            }
        }
    }
    Ok(added)
}
