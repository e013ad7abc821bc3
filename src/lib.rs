//! `flux` - stream resolution core
//!
//! # Features
//!
//! - **Addon aggregation**: Stremio-protocol addons queried in parallel, results
//!   merged, filtered by title and ranked
//! - **Ranking**: sticky source, preferred source, quality ceiling
//! - **Racing**: optional remote worker picks the fastest responding URL
//! - **Session cache**: instant resume of recently played URLs, with liveness
//!   probing once they go stale
//! - **Playback orchestration**: next-candidate failover and next-episode
//!   preloading
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flux::{FluxConfig, MediaInfo, MemoryHistory, NullPlayer, PlaybackOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FluxConfig::load()?;
//!     let orchestrator = PlaybackOrchestrator::new(
//!         config,
//!         Arc::new(NullPlayer),
//!         Arc::new(MemoryHistory::new()),
//!     )?;
//!
//!     let movie = MediaInfo::movie("tt0111161", "The Shawshank Redemption");
//!     let stream = orchestrator.resolve(&movie, movie.identity(None, None)).await?;
//!     println!("{}", stream.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod http_client;
pub mod media;
pub mod playback;
pub mod stream;

pub use config::{
    AddonConfig, FluxConfig, PlaybackConfig, RacingConfig, TimeoutConfig, UserState,
};
pub use error::{FluxError, Result};
pub use history::{MemoryHistory, WatchEvent, WatchHistory};
pub use http_client::HttpClient;
pub use media::{ContentIdentity, MediaInfo, MediaKind, SeasonInfo};
pub use playback::{
    FailureReason, NullPlayer, PlaybackOrchestrator, PlaybackState, Player, ResolutionOrigin,
    ResolvedStream,
};
pub use stream::{
    AddonClient, AggregationPolicy, Candidate, CandidateAggregator, CandidateSource,
    LivenessProbe, QualityTier, RaceCoordinator, RaceResult, RankingPolicy, SessionCache,
    SourceId, TitleMatcher,
};

/// Version of flux
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
