//! Watch history hand-off to the user-data layer.
//!
//! The orchestrator reports what was played and how far; persisting it is
//! somebody else's job. Failures are logged by the caller and never affect
//! playback.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::media::ContentIdentity;

/// One history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub identity: ContentIdentity,
    pub title: String,
    /// Fraction watched, `None` when playback just started.
    pub progress: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl WatchEvent {
    pub fn new(identity: ContentIdentity, title: impl Into<String>, progress: Option<f64>) -> Self {
        Self {
            identity,
            title: title.into(),
            progress,
            recorded_at: Utc::now(),
        }
    }
}

/// Sink for watch history.
#[async_trait]
pub trait WatchHistory: Send + Sync {
    async fn record(&self, event: WatchEvent) -> Result<()>;
}

/// In-memory history, newest last.
#[derive(Default)]
pub struct MemoryHistory {
    events: Mutex<Vec<WatchEvent>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<WatchEvent> {
        self.events.lock().await.clone()
    }

    /// Latest event for an identity.
    pub async fn last_for(&self, identity: &ContentIdentity) -> Option<WatchEvent> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .find(|e| &e.identity == identity)
            .cloned()
    }
}

#[async_trait]
impl WatchHistory for MemoryHistory {
    async fn record(&self, event: WatchEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
