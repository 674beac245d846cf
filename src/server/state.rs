use crate::{
    config::Config,
    fetch::{Fetch, HttpFetcher},
};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream transport; a trait object so tests can substitute one
    pub fetcher: Arc<dyn Fetch>,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        let fetcher =
            HttpFetcher::from_config(&config).expect("Failed to build upstream HTTP client");

        Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
        }
    }

    /// State with an injected transport (tests, strict-TLS deployments).
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }
}
