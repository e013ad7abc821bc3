//! Shared HTTP client
//!
//! Features:
//! - HTTP/2 where the server offers it, HTTP/1.1 otherwise
//! - TLS 1.3 via rustls
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - DNS caching + Happy Eyeballs
//! - Connection pooling with keep-alive
//! - Browser-like User-Agent (some addon hosts reject library agents)
//!
//! Per-request timeouts are set by the caller; the client-level timeout is
//! only a backstop.

use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tracing::debug;

/// Desktop Chrome user agent sent to addon hosts.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client shared by addons, the racer and the liveness probe
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client with the browser user agent
    pub fn new() -> Result<Self> {
        Self::with_user_agent(BROWSER_USER_AGENT)
    }

    /// Create a client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));

        let client = Client::builder()
            // Let the server negotiate HTTP/2
            .http2_adaptive_window(true)
            // Keep connections alive for reuse across addon calls
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            // Lower latency for small JSON requests and probes
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .user_agent(user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        debug!(user_agent, "HTTP client ready");

        Ok(Self { client })
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
