use axum::{Json, response::IntoResponse};
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Instant;

static STARTED: Lazy<Instant> = Lazy::new(Instant::now);

/// Liveness endpoint, also served at `/`.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": STARTED.elapsed().as_secs(),
    }))
}
