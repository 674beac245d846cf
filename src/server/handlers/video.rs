//! The proxy endpoint: fetch, classify, then relay, rewrite, or normalize.

use crate::{
    classify::{self, Classification, HeaderClass, SubtitleFormat},
    error::{ProxyError, Result},
    fetch::FetchRequest,
    hls::rewrite::{RewriteContext, rewrite_playlist},
    metrics,
    server::{state::AppState, url_validation::validate_target_url},
    subtitle,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Query parameters of `GET /api/proxy/video`.
#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    /// Absolute URL of the target resource.
    url: Option<String>,
    /// Referer override, propagated into every rewritten sub-request URL.
    referer: Option<String>,
    /// Subtitle URL to inject when the target is a master playlist.
    sub: Option<String>,
}

/// Proxy a remote video resource: binary media is relayed as a live stream,
/// playlists are rewritten to point back at this endpoint, subtitles are
/// normalized to WebVTT, anything else passes through buffered.
pub async fn proxy_video(
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let raw_url = params.url.as_deref().ok_or(ProxyError::MissingUrlParam)?;
    let target =
        Url::parse(raw_url).map_err(|e| ProxyError::InvalidUrl(format!("{raw_url}: {e}")))?;
    validate_target_url(&target, state.config.allow_private_targets)?;

    info!("Proxying {}", target);

    let request = FetchRequest {
        url: target,
        referer: params.referer.clone(),
        range: header_value(&headers, header::RANGE),
    };

    let result = match state.fetcher.fetch(request).await {
        Ok(result) => result,
        Err(e) => {
            metrics::record_upstream_error();
            return Err(e);
        }
    };

    let upstream_status = result.response.status();
    if upstream_status.as_u16() >= 400 {
        metrics::record_upstream_error();
        return Err(ProxyError::UpstreamStatus {
            status: StatusCode::from_u16(upstream_status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            reason: upstream_status
                .canonical_reason()
                .unwrap_or("upstream failure")
                .to_string(),
        });
    }

    let content_type = result
        .response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let final_url = result.final_url.clone();

    // Stage one: headers and URL suffix gate the stream-vs-buffer decision.
    let header_class = classify::classify_headers(&content_type, final_url.as_str());

    if header_class == HeaderClass::Binary {
        let response = relay_stream(result.response, &content_type)?;
        metrics::record_request("binary", upstream_status.as_u16());
        metrics::record_duration("binary", start);
        return Ok(response);
    }

    // Stage two: buffer (bounded) and give content sniffing a second chance.
    let body = buffer_body(result.response, state.config.max_text_body_bytes).await?;
    let decision = classify::confirm(header_class, &classify::sample(&body));
    debug!("Classified {} as {:?}", final_url, decision);

    match decision {
        Classification::Playlist => {
            let ctx = RewriteContext {
                proxy_origin: proxy_origin(&headers)?,
                referer: params.referer,
                subtitle_url: params.sub,
            };
            let text = String::from_utf8_lossy(&body);
            let rewritten = rewrite_playlist(&text, &final_url, &ctx);

            metrics::record_request("playlist", 200);
            metrics::record_duration("playlist", start);
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                rewritten,
            )
                .into_response())
        }

        Classification::Subtitle(format) => {
            let vtt = subtitle::normalize(&body, format == SubtitleFormat::Srt);

            metrics::record_request("subtitle", 200);
            metrics::record_duration("subtitle", start);
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/vtt; charset=utf-8"),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                vtt,
            )
                .into_response())
        }

        // A buffered body with no text classification: return it unmodified.
        Classification::Binary | Classification::Fallback => {
            let content_type = if content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                content_type
            };

            metrics::record_request("fallback", upstream_status.as_u16());
            metrics::record_duration("fallback", start);
            Ok((
                StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK),
                [
                    (header::CONTENT_TYPE, content_type.as_str()),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                body,
            )
                .into_response())
        }
    }
}

/// Relay a live upstream byte stream without buffering. Backpressure and
/// client-disconnect cancellation are handled by the body stream itself: the
/// upstream connection is dropped as soon as the response body is.
fn relay_stream(response: reqwest::Response, content_type: &str) -> Result<Response> {
    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);

    let mut builder = Response::builder()
        .status(status)
        .header(
            header::CONTENT_TYPE,
            if content_type.is_empty() {
                "video/mp4"
            } else {
                content_type
            },
        )
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCEPT_RANGES, "bytes");

    // Mirror size/range headers so seeking keeps working through the proxy.
    for name in [header::CONTENT_LENGTH, header::CONTENT_RANGE] {
        if let Some(value) = response.headers().get(&name) {
            builder = builder.header(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| ProxyError::Internal(format!("failed to build relay response: {e}")))
}

/// Buffer a small text body, failing rather than growing without bound.
async fn buffer_body(response: reqwest::Response, cap: usize) -> Result<Vec<u8>> {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > cap {
            return Err(ProxyError::Internal(format!(
                "response body exceeds the {cap}-byte buffer cap"
            )));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

/// Origin of this proxy as seen by the client, for generated URLs.
fn proxy_origin(headers: &HeaderMap) -> Result<String> {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProxyError::Internal("request has no Host header".to_string()))?;

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");

    Ok(format!("{proto}://{host}"))
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
