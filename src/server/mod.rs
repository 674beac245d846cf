pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use crate::metrics;
use axum::{Router, http::Method, routing::get};
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Build the router with all routes and shared state.
///
/// Separate from [`start`] so integration tests can drive the router
/// without binding a socket.
pub fn build_router(config: Config) -> Router {
    let state = AppState::new(config);
    router_with_state(state)
}

/// Router construction on top of an already-built state, so tests can
/// inject their own transport.
pub fn router_with_state(state: AppState) -> Router {
    // Install the Prometheus recorder before any handler can record;
    // metrics recorded ahead of installation go to a no-op recorder and
    // are lost.
    let _ = metrics::prometheus_handle();

    // Browsers preflight ranged media requests; answer them permissively.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(serve_metrics))
        .route("/api/proxy/video", get(handlers::video::proxy_video))
        .layer(cors)
        .with_state(state)
}

async fn serve_metrics() -> String {
    metrics::prometheus_handle().render()
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let app = build_router(config);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    // Start serving
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
