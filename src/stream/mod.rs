//! Stream discovery, ranking and racing.
//!
//! Candidates come from addon sources, get merged and ranked by the
//! aggregator, and are narrowed to one URL by the racer. Previously chosen
//! URLs live in the session cache.

pub mod addon;
pub mod aggregator;
pub mod candidate;
pub mod matching;
pub mod probe;
pub mod racer;
pub mod ranking;
pub mod session;
pub mod source;

pub use addon::AddonClient;
pub use aggregator::{AggregationPolicy, CandidateAggregator};
pub use candidate::{Candidate, QualityTier, SourceId};
pub use matching::TitleMatcher;
pub use probe::LivenessProbe;
pub use racer::{RaceCoordinator, RaceResult};
pub use ranking::RankingPolicy;
pub use session::{SessionCache, SessionEntry};
pub use source::CandidateSource;
