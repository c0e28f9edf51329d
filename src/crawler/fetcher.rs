//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the identifying user agent
//! - Guarded DNS resolution so no connection reaches non-public addresses
//! - Redirect following with re-validation of the final host
//! - Byte-capped body reads and HTML content-type gating
//! - Retry logic for transient failures
//! - Error classification into reason codes

use crate::config::Config;
use crate::state::{ReasonCode, STATUS_POLICY_DENIED, STATUS_TRANSPORT_FAILURE};
use crate::url::{is_unsafe_ip, url_registrable_domain, GuardError, HostGuard};
use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Everything known about a fetch besides its status and body
#[derive(Debug, Clone, Default)]
pub struct FetchDiagnostics {
    /// URL after redirects (or the refused redirect target)
    pub final_url: String,

    /// Content-Type header value, lowercased
    pub content_type: String,

    pub is_html: bool,

    /// Why no body was produced
    pub reason: Option<ReasonCode>,

    /// Free-text detail (error message, refused host, ...)
    pub detail: String,

    /// Number of attempts made, including the first
    pub attempts: u32,

    pub redirected: bool,

    /// Raw `X-Robots-Tag` header, if any
    pub x_robots_tag: Option<String>,
}

/// Result of fetching one URL
///
/// `body` is only present for a 200 HTML response within the byte cap.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status (0 for transport failure, 451 for policy denial)
    pub status: u16,
    pub body: Option<String>,
    pub diagnostics: FetchDiagnostics,
}

impl FetchResponse {
    /// Returns true for a 200 response carrying an HTML body
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.body.is_some()
    }

    fn failure(status: u16, reason: ReasonCode, diagnostics: FetchDiagnostics) -> Self {
        Self {
            status,
            body: None,
            diagnostics: FetchDiagnostics {
                reason: Some(reason),
                ..diagnostics
            },
        }
    }
}

/// A fetch that produced no usable text
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub reason: ReasonCode,
    pub detail: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.reason, self.detail)
        }
    }
}

/// Plain-text response used for robots.txt
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: u16,
    pub body: String,
}

enum BodyError {
    TooLarge,
    Read(reqwest::Error),
}

/// DNS resolution for the HTTP client that refuses non-public addresses
///
/// Every connection, each redirect hop included, resolves through the
/// guard, so a hostname pointing into private space is never contacted.
struct GuardedDns {
    guard: HostGuard,
}

impl Resolve for GuardedDns {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.guard.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            let ips = guard.resolve_public(&host).await?;
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed up to the configured limit, but a hop to an
/// unsafe IP literal is never followed; the 3xx is returned instead so the
/// fetcher can refuse it. Hostnames resolve through `guard` and fail to
/// connect when any address is non-public. Proxies are never used, since a
/// proxy would resolve hosts on its own.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `guard` - Host safety guard used for DNS resolution
/// * `pins` - Hostnames whose DNS resolution is overridden with a fixed
///   address; pinned hosts bypass the guard
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &Config,
    guard: &HostGuard,
    pins: &[(String, SocketAddr)],
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

    let mut builder = Client::builder()
        .user_agent(config.user_agent.header_value())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.fetch.total_timeout_secs))
        .connect_timeout(Duration::from_secs(config.fetch.connect_timeout_secs))
        .redirect(redirect_policy(config.fetch.max_redirects))
        .dns_resolver(Arc::new(GuardedDns {
            guard: guard.clone(),
        }))
        .no_proxy()
        .gzip(true)
        .brotli(true);

    for (host, addr) in pins {
        builder = builder.resolve(host, *addr);
    }

    builder.build()
}

fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            attempt.error("too many redirects")
        } else if is_unsafe_ip_literal(attempt.url()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

fn is_unsafe_ip_literal(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_unsafe_ip(&IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_unsafe_ip(&IpAddr::V6(ip)),
        _ => false,
    }
}

/// Fetches pages with retries, size caps, and post-redirect host checks
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    guard: HostGuard,
    max_body_bytes: usize,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    pub fn new(
        config: &Config,
        guard: HostGuard,
        pins: &[(String, SocketAddr)],
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, &guard, pins)?,
            guard,
            max_body_bytes: config.fetch.max_body_bytes,
            max_attempts: config.fetch.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
        })
    }

    /// Fetches a URL with full error handling and retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Hop to a non-public host | Refused before connecting, 451, no retry |
    /// | Final host unsafe or off-domain | 451, no retry |
    /// | 200 HTML within cap | Success |
    /// | 200 non-HTML | `non_html`, no retry |
    /// | 200 HTML, empty body | `empty_body`, no retry |
    /// | Body over cap | `body_too_large`, no retry |
    /// | HTTP 5xx / 429 | Retry with fixed backoff |
    /// | Other HTTP status | `http_status`, no retry |
    /// | Timeout / connect / read error | Retry with fixed backoff |
    ///
    /// After the last attempt the last status is returned (0 for transport).
    pub async fn fetch(&self, url: &Url) -> FetchResponse {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let (mut response, retryable) = self.attempt(url).await;
            response.diagnostics.attempts = attempts;

            if !retryable || attempts >= self.max_attempts {
                return response;
            }

            tracing::debug!(
                "Attempt {}/{} for {} failed (status {}, {}), retrying in {:?}",
                attempts,
                self.max_attempts,
                url,
                response.status,
                response
                    .diagnostics
                    .reason
                    .map(|r| r.as_str())
                    .unwrap_or("unknown"),
                self.retry_backoff
            );
            tokio::time::sleep(self.retry_backoff).await;
        }
    }

    /// One request; the flag says whether another attempt may help
    async fn attempt(&self, url: &Url) -> (FetchResponse, bool) {
        let mut diag = FetchDiagnostics {
            final_url: url.to_string(),
            ..Default::default()
        };

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let (status, reason, refused) = self.send_failure(url, &e).await;
                diag.detail = e.to_string();
                if let Some(target) = refused {
                    diag.final_url = target.to_string();
                    diag.redirected = true;
                }
                return (
                    FetchResponse::failure(status, reason, diag),
                    reason.is_transient(),
                );
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        diag.final_url = final_url.to_string();
        diag.redirected = final_url != *url;
        diag.content_type = header_string(&response, CONTENT_TYPE.as_str()).to_lowercase();
        diag.is_html = is_html_content_type(&diag.content_type);
        diag.x_robots_tag = header_values(&response, "x-robots-tag");

        // A redirect the client refused to follow
        if status.is_redirection() {
            if let Some(target) = redirect_target(&response, &final_url) {
                if let Some(reason) = self.check_destination(url, &target).await {
                    diag.final_url = target.to_string();
                    diag.redirected = true;
                    diag.detail = format!("refused redirect to {}", target);
                    return (FetchResponse::failure(STATUS_POLICY_DENIED, reason, diag), false);
                }
            }
        }

        if let Some(reason) = self.check_destination(url, &final_url).await {
            diag.detail = format!("refused final host {}", final_url.host_str().unwrap_or(""));
            return (FetchResponse::failure(STATUS_POLICY_DENIED, reason, diag), false);
        }

        let code = status.as_u16();

        if status != StatusCode::OK {
            diag.detail = format!("HTTP {}", code);
            return (
                FetchResponse::failure(code, ReasonCode::HttpStatus, diag),
                is_retryable_status(status),
            );
        }

        if !diag.is_html {
            diag.detail = format!("content-type '{}'", diag.content_type);
            return (FetchResponse::failure(code, ReasonCode::NonHtml, diag), false);
        }

        match self.read_capped(response).await {
            Ok(bytes) if bytes.is_empty() => {
                (FetchResponse::failure(code, ReasonCode::EmptyBody, diag), false)
            }
            Ok(bytes) => (
                FetchResponse {
                    status: code,
                    body: Some(String::from_utf8_lossy(&bytes).into_owned()),
                    diagnostics: diag,
                },
                false,
            ),
            Err(BodyError::TooLarge) => {
                diag.detail = format!("body exceeds {} bytes", self.max_body_bytes);
                (FetchResponse::failure(code, ReasonCode::BodyTooLarge, diag), false)
            }
            Err(BodyError::Read(e)) => {
                diag.detail = e.to_string();
                let reason = ReasonCode::TransportError;
                (FetchResponse::failure(code, reason, diag), reason.is_transient())
            }
        }
    }

    /// Fetches a plain-text resource without content-type gating
    ///
    /// Used for robots.txt. The same byte cap, host checks, and retry
    /// policy apply. A final 5xx or 429 is returned as a response.
    pub async fn fetch_text(&self, url: &Url) -> Result<TextResponse, FetchFailure> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let (result, retryable) = self.attempt_text(url).await;

            if !retryable || attempts >= self.max_attempts {
                return result;
            }

            tracing::debug!(
                "Attempt {}/{} for {} failed, retrying in {:?}",
                attempts,
                self.max_attempts,
                url,
                self.retry_backoff
            );
            tokio::time::sleep(self.retry_backoff).await;
        }
    }

    async fn attempt_text(&self, url: &Url) -> (Result<TextResponse, FetchFailure>, bool) {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let (_, reason, _) = self.send_failure(url, &e).await;
                let failure = FetchFailure {
                    reason,
                    detail: e.to_string(),
                };
                return (Err(failure), reason.is_transient());
            }
        };

        let final_url = response.url().clone();
        if let Some(reason) = self.check_destination(url, &final_url).await {
            let failure = FetchFailure {
                reason,
                detail: final_url.to_string(),
            };
            return (Err(failure), false);
        }

        let status = response.status();
        if is_retryable_status(status) {
            let response = TextResponse {
                status: status.as_u16(),
                body: String::new(),
            };
            return (Ok(response), true);
        }

        match self.read_capped(response).await {
            Ok(bytes) => {
                let response = TextResponse {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                };
                (Ok(response), false)
            }
            Err(BodyError::TooLarge) => {
                let failure = FetchFailure {
                    reason: ReasonCode::BodyTooLarge,
                    detail: format!("body exceeds {} bytes", self.max_body_bytes),
                };
                (Err(failure), false)
            }
            Err(BodyError::Read(e)) => {
                let reason = ReasonCode::TransportError;
                let failure = FetchFailure {
                    reason,
                    detail: e.to_string(),
                };
                (Err(failure), reason.is_transient())
            }
        }
    }

    /// Classifies a request that failed before producing a response
    ///
    /// A redirect hop the guard refused to connect to is reported as a
    /// denial of that hop, together with the refused target.
    async fn send_failure(&self, url: &Url, e: &reqwest::Error) -> (u16, ReasonCode, Option<Url>) {
        if let Some(target) = e.url().filter(|target| *target != url) {
            if let Some(reason) = self.check_destination(url, target).await {
                return (STATUS_POLICY_DENIED, reason, Some(target.clone()));
            }
        }

        if is_guard_refusal(e) {
            tracing::warn!("Refusing {}: host resolves to non-public address", url);
            return (STATUS_POLICY_DENIED, ReasonCode::UnsafeHost, None);
        }

        (STATUS_TRANSPORT_FAILURE, classify_error(e), None)
    }

    /// Re-validates where a request ended up
    ///
    /// Returns the denial reason if the destination host is unsafe or has
    /// left the original registrable domain.
    async fn check_destination(&self, original: &Url, destination: &Url) -> Option<ReasonCode> {
        if self.guard.is_unsafe_url(destination).await {
            tracing::warn!("Refusing unsafe destination {} (from {})", destination, original);
            return Some(ReasonCode::RedirectUnsafeHost);
        }

        let original_domain = url_registrable_domain(original);
        if original_domain.is_none() || original_domain != url_registrable_domain(destination) {
            tracing::debug!("Refusing off-domain destination {} (from {})", destination, original);
            return Some(ReasonCode::RedirectOutOfScope);
        }

        None
    }

    /// Reads the body, giving up as soon as it exceeds the byte cap
    async fn read_capped(&self, mut response: Response) -> Result<Vec<u8>, BodyError> {
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(BodyError::TooLarge);
        }

        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(BodyError::Read)? {
            if buf.len() + chunk.len() > self.max_body_bytes {
                return Err(BodyError::TooLarge);
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf)
    }
}

/// Maps a transport error to its reason code
fn classify_error(e: &reqwest::Error) -> ReasonCode {
    if e.is_timeout() {
        ReasonCode::Timeout
    } else if e.is_connect() {
        ReasonCode::ConnectError
    } else {
        ReasonCode::TransportError
    }
}

/// Returns true if the guarded resolver caused the failure
fn is_guard_refusal(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if err.is::<GuardError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Server errors and rate limiting may clear up on a later attempt
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Returns true for HTML and XHTML content types
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn header_string(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn header_values(response: &Response, name: &str) -> Option<String> {
    let values: Vec<&str> = response
        .headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

fn redirect_target(response: &Response, base: &Url) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    base.join(location).ok()
}
