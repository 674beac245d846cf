//! Error taxonomy for the proxy.
//!
//! Every handler returns [`Result<T>`]; the [`IntoResponse`] impl is the
//! single place errors become HTTP responses, so nothing panics out of a
//! request and the process never crashes on upstream misbehavior.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The required `url` query parameter was absent.
    #[error("Missing URL parameter")]
    MissingUrlParam,

    /// The `url` parameter (or a value derived from it) failed to parse.
    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    /// Target rejected by the SSRF guard.
    #[error("Target not allowed: {0}")]
    TargetNotAllowed(String),

    /// Redirect budget exhausted while following upstream redirects.
    #[error("Too many redirects")]
    TooManyRedirects,

    /// Upstream answered with an error status (>= 400).
    #[error("Upstream Error: {reason}")]
    UpstreamStatus { status: StatusCode, reason: String },

    /// Transport-level failure talking to the upstream.
    #[error("Upstream fetch failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Anything else that should surface as a 500.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::MissingUrlParam => {
                (StatusCode::BAD_REQUEST, "Missing URL parameter").into_response()
            }
            ProxyError::TargetNotAllowed(reason) => {
                error!("Rejected proxy target: {}", reason);
                (StatusCode::FORBIDDEN, format!("Target not allowed: {reason}")).into_response()
            }
            ProxyError::UpstreamStatus { status, reason } => {
                error!("Upstream returned {}: {}", status, reason);
                (status, format!("Upstream Error: {reason}")).into_response()
            }
            other => {
                error!("Proxy error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal Server Error: {other}"),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ProxyError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn missing_url_param_is_400() {
        assert_eq!(status_of(ProxyError::MissingUrlParam), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_passes_through() {
        let err = ProxyError::UpstreamStatus {
            status: StatusCode::NOT_FOUND,
            reason: "Not Found".to_string(),
        };
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn malformed_url_is_500() {
        let err = ProxyError::InvalidUrl("not a url".to_string());
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn blocked_target_is_403() {
        let err = ProxyError::TargetNotAllowed("loopback".to_string());
        assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    }

    #[test]
    fn redirect_exhaustion_is_500() {
        assert_eq!(
            status_of(ProxyError::TooManyRedirects),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_carry_message() {
        let err = ProxyError::Internal("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
