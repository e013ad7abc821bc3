//! Candidate source trait.
//!
//! A [`CandidateSource`] knows how to ask one external service for the
//! streams it has for a [`ContentIdentity`]. The aggregator fans out over a
//! list of them; [`AddonClient`](super::addon::AddonClient) is the HTTP
//! implementation.

use async_trait::async_trait;

use super::candidate::{Candidate, SourceId};
use crate::media::ContentIdentity;

/// Trait for stream-providing backends.
///
/// Implementations must fail soft: any error becomes an empty list after
/// being logged, so one broken source never hides the others.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Configured source name, used for ranking and logging.
    fn id(&self) -> &SourceId;

    /// Fetch every stream this source offers for `identity`.
    async fn fetch(&self, identity: &ContentIdentity) -> Vec<Candidate>;
}
