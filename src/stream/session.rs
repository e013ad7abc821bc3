//! Last selected URL per content identity.
//!
//! A passive store: the orchestrator decides what counts as fresh.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::media::ContentIdentity;

/// Default age after which an entry must be probed before reuse.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60 * 60);

/// The most recently selected stream for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub url: Url,
    pub selected_at: Instant,
}

impl SessionEntry {
    pub fn age(&self) -> Duration {
        self.selected_at.elapsed()
    }

    /// Young enough to reuse without a liveness probe.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age() < window
    }
}

/// Keyed store of [`SessionEntry`] values, overwritten on every store.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<ContentIdentity, SessionEntry>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, identity: &ContentIdentity) -> Option<SessionEntry> {
        self.entries.read().await.get(identity).cloned()
    }

    pub async fn store(&self, identity: &ContentIdentity, url: Url) {
        debug!(id = %identity, %url, "Saved session URL");
        self.entries.write().await.insert(
            identity.clone(),
            SessionEntry {
                url,
                selected_at: Instant::now(),
            },
        );
    }

    /// Restart the freshness window of an existing entry.
    pub async fn touch(&self, identity: &ContentIdentity) {
        if let Some(entry) = self.entries.write().await.get_mut(identity) {
            entry.selected_at = Instant::now();
        }
    }

    pub async fn invalidate(&self, identity: &ContentIdentity) {
        self.entries.write().await.remove(identity);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
