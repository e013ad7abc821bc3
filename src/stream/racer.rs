//! Remote stream racing.
//!
//! A racing worker probes a handful of candidate URLs in parallel and
//! answers with the one that responded first. The worker is an optimisation:
//! every failure here maps to `None` and the caller falls back to the
//! top-ranked candidate.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use super::candidate::{Candidate, SourceId};
use crate::error::{FluxError, Result};

/// Default race timeout.
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of candidates raced per source.
pub const DEFAULT_PER_SOURCE: usize = 5;

#[derive(Debug, Serialize)]
struct RaceRequest<'a> {
    urls: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RaceResponse {
    url: String,
    latency: u64,
    #[serde(default)]
    status: Option<u16>,
}

/// Winner reported by the racing worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceResult {
    pub url: Url,
    pub latency_ms: u64,
}

/// Client for the racing worker.
#[derive(Clone)]
pub struct RaceCoordinator {
    client: Client,
}

impl RaceCoordinator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Race `candidates` through `endpoint`; `None` on any failure.
    pub async fn race(
        &self,
        endpoint: &Url,
        candidates: &[Url],
        timeout: Duration,
    ) -> Option<RaceResult> {
        if candidates.is_empty() {
            return None;
        }
        match self.try_race(endpoint, candidates, timeout).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(%endpoint, "Race failed: {e}");
                None
            }
        }
    }

    /// Race `candidates` through `endpoint`, reporting why it failed.
    #[instrument(skip(self, candidates), fields(endpoint = %endpoint, count = candidates.len()))]
    pub async fn try_race(
        &self,
        endpoint: &Url,
        candidates: &[Url],
        timeout: Duration,
    ) -> Result<RaceResult> {
        let body = RaceRequest {
            urls: candidates.iter().map(Url::as_str).collect(),
        };

        info!("Racing {} streams", candidates.len());

        let resp = self
            .client
            .post(endpoint.clone())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| FluxError::RaceUnavailable(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(FluxError::RaceUnavailable(format!(
                "worker returned HTTP {}",
                resp.status()
            )));
        }

        let data: RaceResponse = resp
            .json()
            .await
            .map_err(|e| FluxError::RaceUnavailable(format!("malformed response: {e}")))?;

        let url = Url::parse(&data.url)
            .map_err(|e| FluxError::RaceUnavailable(format!("winner is not a URL: {e}")))?;

        info!(winner = %url, latency_ms = data.latency, status = ?data.status, "Race won");

        Ok(RaceResult {
            url,
            latency_ms: data.latency,
        })
    }
}

/// URLs worth racing: the top `per_source` candidates of each of the first
/// two sources in ranked order.
pub fn shortlist(ranked: &[Candidate], per_source: usize) -> Vec<Url> {
    let mut sources: Vec<&SourceId> = Vec::new();
    for c in ranked {
        if !sources.contains(&&c.source) {
            sources.push(&c.source);
            if sources.len() == 2 {
                break;
            }
        }
    }

    sources
        .into_iter()
        .flat_map(|source| {
            ranked
                .iter()
                .filter(move |c| &c.source == source)
                .take(per_source)
                .map(|c| c.url.clone())
        })
        .collect()
}
