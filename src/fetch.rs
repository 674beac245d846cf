//! Upstream fetching with manual, bounded redirect following.
//!
//! The client is built with redirect handling disabled so the hop limit is a
//! visible loop invariant here rather than hidden policy inside reqwest, and
//! so the final resolved URL is always available to the playlist rewriter.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{ProxyError, Result};

/// Fixed browser User-Agent sent on every upstream request. Source CDNs
/// routinely reject non-browser agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A single upstream GET to perform.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute target URL.
    pub url: Url,
    /// Referer override; when absent the target's own origin is used.
    pub referer: Option<String>,
    /// Inbound `Range` header, forwarded verbatim when present.
    pub range: Option<String>,
}

impl FetchRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            referer: None,
            range: None,
        }
    }

    /// Referer actually sent upstream: the caller's override, or the target
    /// origin with a trailing slash.
    fn effective_referer(&self) -> String {
        match &self.referer {
            Some(referer) => referer.clone(),
            None => format!("{}/", self.url.origin().ascii_serialization()),
        }
    }
}

/// Outcome of a fetch: the live response plus the URL it finally resolved to
/// after redirects. The body stream is handed off unconsumed.
#[derive(Debug)]
pub struct FetchResult {
    pub final_url: Url,
    pub response: Response,
}

/// Transport seam. Handlers talk to this trait so tests can substitute a
/// strict-verification or canned transport.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult>;
}

/// Production fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
    max_redirects: u32,
}

impl HttpFetcher {
    /// Build the shared upstream client from config: bounded connect/read
    /// timeouts, redirects disabled, and the configured TLS trust policy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ProxyError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }
}

/// Only these statuses are followed; 300/304 are returned to the caller.
fn is_followable_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult> {
        let referer = request.effective_referer();
        let mut current = request.url.clone();
        let mut hops = 0u32;

        loop {
            let mut upstream = self
                .client
                .get(current.clone())
                .header(header::USER_AGENT, USER_AGENT)
                .header(header::ACCEPT, "*/*")
                .header(header::REFERER, referer.as_str());
            // Origin deliberately omitted: CDNs whitelist origins and return
            // 403 on a mismatch.

            if let Some(range) = &request.range {
                upstream = upstream.header(header::RANGE, range.as_str());
            }

            let response = upstream.send().await?;
            let status = response.status().as_u16();

            if is_followable_redirect(status) {
                if let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(ProxyError::TooManyRedirects);
                    }
                    let next = current.join(location).map_err(|e| {
                        ProxyError::InvalidUrl(format!("redirect Location {location}: {e}"))
                    })?;
                    debug!("Redirect hop {}: {} -> {}", hops, current, next);
                    // Dropping the response closes this hop's connection
                    // without reading its body.
                    drop(response);
                    current = next;
                    continue;
                }
            }

            return Ok(FetchResult {
                final_url: current,
                response,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request as MockRequest, ResponseTemplate};

    fn fetcher(max_redirects: u32) -> HttpFetcher {
        let mut config = Config::for_tests();
        config.max_redirects = max_redirects;
        HttpFetcher::from_config(&config).expect("client should build")
    }

    fn parse(url: String) -> Url {
        Url::parse(&url).expect("test urls should be valid")
    }

    /// Matcher asserting the Origin header is absent from the request.
    struct NoOriginHeader;

    impl wiremock::Match for NoOriginHeader {
        fn matches(&self, request: &MockRequest) -> bool {
            !request.headers.contains_key("origin")
        }
    }

    /// Matcher comparing a header against its raw value. wiremock's `header`
    /// matcher splits values on commas, so it cannot match the browser
    /// User-Agent (`… (KHTML, like Gecko) …`).
    struct RawHeader(&'static str, String);

    impl wiremock::Match for RawHeader {
        fn matches(&self, request: &MockRequest) -> bool {
            request
                .headers
                .get(self.0)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == self.1)
        }
    }

    #[tokio::test]
    async fn plain_fetch_returns_final_url_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U"))
            .mount(&server)
            .await;

        let result = fetcher(5)
            .fetch(FetchRequest::new(parse(format!(
                "{}/media.m3u8",
                server.uri()
            ))))
            .await
            .unwrap();

        assert_eq!(result.final_url.path(), "/media.m3u8");
        assert_eq!(result.response.text().await.unwrap(), "#EXTM3U");
    }

    #[tokio::test]
    async fn follows_relative_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let result = fetcher(5)
            .fetch(FetchRequest::new(parse(format!("{}/old", server.uri()))))
            .await
            .unwrap();

        assert_eq!(result.final_url.path(), "/new");
        assert_eq!(result.response.text().await.unwrap(), "moved");
    }

    #[tokio::test]
    async fn chain_within_budget_succeeds() {
        let server = MockServer::start().await;
        for hop in 0..5 {
            Mock::given(method("GET"))
                .and(path(format!("/hop{hop}")))
                .respond_with(
                    ResponseTemplate::new(301).insert_header("Location", format!("/hop{}", hop + 1)),
                )
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/hop5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("end"))
            .mount(&server)
            .await;

        let result = fetcher(5)
            .fetch(FetchRequest::new(parse(format!("{}/hop0", server.uri()))))
            .await
            .unwrap();

        assert_eq!(result.final_url.path(), "/hop5");
    }

    #[tokio::test]
    async fn chain_over_budget_fails() {
        let server = MockServer::start().await;
        for hop in 0..7 {
            Mock::given(method("GET"))
                .and(path(format!("/hop{hop}")))
                .respond_with(
                    ResponseTemplate::new(302).insert_header("Location", format!("/hop{}", hop + 1)),
                )
                .mount(&server)
                .await;
        }

        let err = fetcher(5)
            .fetch(FetchRequest::new(parse(format!("{}/hop0", server.uri()))))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::TooManyRedirects));
    }

    #[tokio::test]
    async fn sends_browser_headers_without_origin() {
        let server = MockServer::start().await;
        let expected_referer = format!("{}/", server.uri());
        Mock::given(method("GET"))
            .and(path("/seg.ts"))
            .and(RawHeader("user-agent", USER_AGENT.to_string()))
            .and(header("accept", "*/*"))
            .and(header("referer", expected_referer.as_str()))
            .and(NoOriginHeader)
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        fetcher(5)
            .fetch(FetchRequest::new(parse(format!("{}/seg.ts", server.uri()))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn referer_override_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seg.ts"))
            .and(header("referer", "https://player.example/watch"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = FetchRequest::new(parse(format!("{}/seg.ts", server.uri())));
        request.referer = Some("https://player.example/watch".to_string());
        fetcher(5).fetch(request).await.unwrap();
    }

    #[tokio::test]
    async fn range_header_forwarded_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .and(header("range", "bytes=100-199"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 100-199/5000")
                    .set_body_bytes(vec![0u8; 100]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut request = FetchRequest::new(parse(format!("{}/clip.mp4", server.uri())));
        request.range = Some("bytes=100-199".to_string());
        let result = fetcher(5).fetch(request).await.unwrap();
        assert_eq!(result.response.status().as_u16(), 206);
    }

    #[tokio::test]
    async fn non_followable_redirect_status_returned_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/multi"))
            .respond_with(ResponseTemplate::new(300))
            .mount(&server)
            .await;

        let result = fetcher(5)
            .fetch(FetchRequest::new(parse(format!("{}/multi", server.uri()))))
            .await
            .unwrap();
        assert_eq!(result.response.status().as_u16(), 300);
    }

    #[test]
    fn redirect_status_set_is_exact() {
        for status in [301, 302, 303, 307, 308] {
            assert!(is_followable_redirect(status));
        }
        for status in [200, 204, 300, 304, 400, 404] {
            assert!(!is_followable_redirect(status));
        }
    }
}
