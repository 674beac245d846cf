use std::env;
use std::time::Duration;

/// Default redirect budget for upstream fetches (hops, not requests).
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Default cap on buffered text bodies (playlists/subtitles), in bytes.
pub const DEFAULT_MAX_TEXT_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Maximum number of redirect hops to follow upstream
    pub max_redirects: u32,
    /// Upstream connect timeout
    pub connect_timeout: Duration,
    /// Upstream idle-read timeout
    pub read_timeout: Duration,
    /// Accept self-signed/invalid upstream TLS certificates.
    /// Many source CDNs run with broken certs; on by default, but injectable
    /// so strict-verification transports can be configured.
    pub accept_invalid_certs: bool,
    /// Cap on buffered playlist/subtitle bodies
    pub max_text_body_bytes: usize,
    /// Permit fetching private/loopback targets (local dev and tests)
    pub allow_private_targets: bool,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let max_redirects = env::var("MAX_REDIRECTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_REDIRECTS);

        let connect_timeout_secs: u64 = env::var("CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let read_timeout_secs: u64 = env::var("READ_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        // Deliberate trust policy: upstream CDNs frequently serve misconfigured
        // certificates, so lenient verification is the default.
        let accept_invalid_certs = env::var("ACCEPT_INVALID_CERTS")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let max_text_body_bytes = env::var("MAX_TEXT_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TEXT_BODY_BYTES);

        // SSRF gate: defaults to the dev flag so local upstreams work in dev
        // and tests, while production rejects private address space.
        let allow_private_targets = env::var("ALLOW_PRIVATE_TARGETS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(is_dev);

        Ok(Config {
            port,
            is_dev,
            max_redirects,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            read_timeout: Duration::from_secs(read_timeout_secs),
            accept_invalid_certs,
            max_text_body_bytes,
            allow_private_targets,
        })
    }

    /// Config suitable for tests and local tooling: dev defaults, private
    /// targets allowed, port 0.
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            is_dev: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
            max_text_body_bytes: DEFAULT_MAX_TEXT_BODY_BYTES,
            allow_private_targets: true,
        }
    }
}
