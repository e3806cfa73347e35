// src/admin.rs

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::storage::Credential;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub eligible: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct KeyView {
    #[serde(flatten)]
    pub credential: Credential,
    pub eligible: bool,
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/keys", get(list_keys))
        .route("/admin/keys/:id/probe", post(request_probe))
}

/// Pool health: 200 while at least one credential is eligible, 503 otherwise.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let records = state.pool.snapshot().await?;
    let now = state.pool.clock().now();
    let eligible = records.iter().filter(|c| c.is_eligible(now)).count();

    let (code, status) = if eligible > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    Ok((
        code,
        Json(HealthResponse {
            status,
            eligible,
            total: records.len(),
        }),
    ))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match crate::metrics::render() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, "metrics are disabled\n".to_string()),
    }
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<KeyView>>> {
    authorize(&state, &headers)?;
    let now = state.pool.clock().now();
    let keys = state
        .pool
        .snapshot()
        .await?
        .into_iter()
        .map(|credential| KeyView {
            eligible: credential.is_eligible(now),
            credential,
        })
        .collect();
    Ok(Json(keys))
}

async fn request_probe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    authorize(&state, &headers)?;
    state.pool.get(&id).await?;
    state.pool.request_probe(&id);
    info!(credential.id = %id, "Probe requested via admin API");
    Ok(StatusCode::ACCEPTED)
}

/// Bearer-token check. Without a configured token the admin routes are open.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.config.server.admin_token.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if secure_compare(token, expected) => Ok(()),
        _ => {
            warn!("Admin authentication failed: invalid or missing token");
            Err(AppError::Unauthorized)
        }
    }
}

/// Constant-time string comparison
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
