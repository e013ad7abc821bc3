//! Liveness probing for previously played URLs.
//!
//! A cached stream URL can expire upstream at any time. Before reusing a
//! stale one we send a HEAD request and only keep it if the server still
//! serves it.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// HEAD-request liveness checker.
#[derive(Clone)]
pub struct LivenessProbe {
    client: Client,
}

impl LivenessProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// `true` when the URL answers 200 or 206 within `timeout`.
    ///
    /// Transport errors and any other status count as dead.
    pub async fn is_alive(&self, url: &Url, timeout: Duration) -> bool {
        let start = Instant::now();

        let response = match self
            .client
            .head(url.clone())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, "Probe failed: {e}");
                return false;
            }
        };

        let status = response.status();
        let alive = matches!(status, StatusCode::OK | StatusCode::PARTIAL_CONTENT);

        info!(
            %url,
            %status,
            alive,
            "Probed in {:?}",
            start.elapsed()
        );

        alive
    }
}
