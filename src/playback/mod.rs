//! Playback sessions: turning a content identity into a playing stream.
//!
//! [`PlaybackOrchestrator`] drives the state machine
//!
//! ```text
//! Idle → Resolving → Racing → Resolved → Playing → NextCandidate → Playing
//!                                           │
//!                                           └→ Failed | Closed
//! ```
//!
//! and talks to the video engine through the [`Player`] trait.

pub mod orchestrator;

use std::fmt;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::media::ContentIdentity;
use crate::stream::Candidate;

pub use orchestrator::PlaybackOrchestrator;

/// Why a session ended in [`PlaybackState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    NoCandidates,
    AllCandidatesExhausted,
}

impl FailureReason {
    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::NoCandidates => "No streams are available for this title.",
            Self::AllCandidatesExhausted => "Unable to play video. Please try another source.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Observable playback session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Resolving,
    Racing,
    Resolved,
    Playing,
    NextCandidate,
    Failed(FailureReason),
    Closed,
}

/// How the resolved URL was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionOrigin {
    /// Reused a fresh session entry without touching the network.
    SessionCache,
    /// Reused a stale session entry that passed the liveness probe.
    Revalidated,
    /// Winner of the remote race.
    Raced { latency_ms: u64 },
    /// First ranked candidate, used when racing was off or failed.
    TopRanked,
    /// Picked by the user.
    Manual,
}

/// Result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStream {
    pub identity: ContentIdentity,
    pub url: Url,
    pub origin: ResolutionOrigin,
    /// Candidate behind the URL, when it came from the ranked list.
    pub candidate: Option<Candidate>,
}

/// Control surface of the video engine.
pub trait Player: Send + Sync {
    fn play(&self, url: &Url);
    fn pause(&self);
    fn stop(&self);
}

/// Player that only logs; for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

impl Player for NullPlayer {
    fn play(&self, url: &Url) {
        debug!(%url, "play");
    }

    fn pause(&self) {
        debug!("pause");
    }

    fn stop(&self) {
        debug!("stop");
    }
}
