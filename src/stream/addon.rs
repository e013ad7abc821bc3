//! Stremio-style addon client.
//!
//! Addons answer `GET <base>/stream/<movie|series>/<id>.json` with a list of
//! streams. Responses are untrusted: the client tolerates missing titles,
//! skips unparsable URLs and undoes upstream percent-encoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::candidate::{Candidate, QualityTier, SourceId};
use super::source::CandidateSource;
use crate::error::{FluxError, Result};
use crate::media::ContentIdentity;

/// Default addon request timeout.
pub const DEFAULT_ADDON_TIMEOUT: Duration = Duration::from_secs(8);

/// Upper bound on percent-decoding passes.
const MAX_DECODE_PASSES: usize = 3;

#[derive(Debug, Deserialize)]
struct AddonResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

#[derive(Debug, Deserialize)]
struct AddonStream {
    name: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

impl AddonStream {
    fn into_candidate(self, source: &SourceId) -> Option<Candidate> {
        let raw = self.url?;
        let url = match Url::parse(&sanitize_stream_url(&raw)) {
            Ok(url) => url,
            Err(e) => {
                debug!(addon = %source, url = %raw, error = %e, "Skipping unparsable stream URL");
                return None;
            }
        };

        let mut quality = self
            .title
            .as_deref()
            .map_or(QualityTier::Sd, QualityTier::from_title);
        if quality == QualityTier::Sd {
            if let Some(name) = &self.name {
                quality = QualityTier::from_title(name);
            }
        }

        let title = self.title.or(self.name).unwrap_or_else(|| "Unknown".to_string());

        Some(Candidate {
            title,
            url,
            source: source.clone(),
            quality,
        })
    }
}

/// Undo the extra percent-encoding some addons apply to stream URLs.
///
/// At most three passes. Each pass collapses the `%25` double-encoding
/// marker back to `%`, leaving other escapes alone so nested query values
/// (`?u=https%3A%2F%2F...%26b%3D2`) keep their structure. Only a string that
/// still does not parse as a URL gets a full percent-decode, which unwraps
/// wholly encoded URLs such as `http%3A%2F%2Fhost%2Fa.mp4`.
pub fn sanitize_stream_url(raw: &str) -> String {
    decode_passes(raw).0
}

fn decode_passes(raw: &str) -> (String, usize) {
    let mut current = raw.to_string();
    let mut passes = 0;

    while passes < MAX_DECODE_PASSES {
        let next = if current.contains("%25") {
            current.replace("%25", "%")
        } else if current.contains('%') && Url::parse(&current).is_err() {
            let Ok(decoded) = urlencoding::decode(&current).map(|d| d.into_owned()) else {
                break;
            };
            decoded
        } else {
            break;
        };

        if next == current {
            break;
        }
        current = next;
        passes += 1;
    }

    (current, passes)
}

/// HTTP client for one addon instance.
pub struct AddonClient {
    id: SourceId,
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl AddonClient {
    pub fn new(id: SourceId, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: DEFAULT_ADDON_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream endpoint for an identity.
    pub fn stream_url(&self, identity: &ContentIdentity) -> String {
        format!(
            "{}/stream/{}/{}.json",
            self.base_url,
            identity.kind(),
            identity.stream_id()
        )
    }

    /// Fetch candidates, reporting why a request failed.
    ///
    /// A 404 is the addon saying it has nothing and yields `Ok(vec![])`.
    #[instrument(skip(self), fields(addon = %self.id, id = %identity))]
    pub async fn try_fetch(&self, identity: &ContentIdentity) -> Result<Vec<Candidate>> {
        let url = self.stream_url(identity);
        debug!(%url, "Requesting streams");

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FluxError::SourceUnavailable {
                addon: self.id.clone(),
                reason: e.to_string(),
            })?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                debug!("Addon returned 404");
                return Ok(Vec::new());
            }
            status => {
                return Err(FluxError::SourceUnavailable {
                    addon: self.id.clone(),
                    reason: format!("HTTP {status}"),
                });
            }
        }

        let body = resp.bytes().await.map_err(|e| FluxError::SourceUnavailable {
            addon: self.id.clone(),
            reason: e.to_string(),
        })?;
        let data: AddonResponse =
            serde_json::from_slice(&body).map_err(|e| FluxError::Decode {
                addon: self.id.clone(),
                reason: e.to_string(),
            })?;

        let candidates: Vec<Candidate> = data
            .streams
            .into_iter()
            .filter_map(|s| s.into_candidate(&self.id))
            .collect();

        info!(count = candidates.len(), "Addon streams found");
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateSource for AddonClient {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn fetch(&self, identity: &ContentIdentity) -> Vec<Candidate> {
        match self.try_fetch(identity).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(addon = %self.id, id = %identity, "Addon fetch failed: {e}");
                Vec::new()
            }
        }
    }
}
