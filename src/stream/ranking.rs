//! Deterministic ordering of candidate streams.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, QualityTier, SourceId};

/// Inputs to the sort policy, snapshotted when a resolution starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingPolicy {
    /// Source the user last picked by hand; always sorts first.
    pub sticky_source: Option<SourceId>,
    /// Source favoured over every other non-sticky source.
    pub preferred_source: Option<SourceId>,
    /// Highest tier the user wants to play.
    pub quality_ceiling: QualityTier,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            sticky_source: None,
            preferred_source: None,
            quality_ceiling: QualityTier::Uhd,
        }
    }
}

impl RankingPolicy {
    /// Compare two candidates under the policy.
    ///
    /// Precedence, each stage only breaking ties of the previous one:
    /// sticky source, preferred source, quality at or under the ceiling,
    /// then quality closest to the ceiling (descending when compliant,
    /// ascending when above it).
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let is = |source: &Option<SourceId>, c: &Candidate| source.as_ref() == Some(&c.source);

        is(&self.sticky_source, b)
            .cmp(&is(&self.sticky_source, a))
            .then_with(|| is(&self.preferred_source, b).cmp(&is(&self.preferred_source, a)))
            .then_with(|| {
                let a_ok = a.quality <= self.quality_ceiling;
                let b_ok = b.quality <= self.quality_ceiling;
                b_ok.cmp(&a_ok).then_with(|| {
                    if a_ok {
                        b.quality.cmp(&a.quality)
                    } else {
                        a.quality.cmp(&b.quality)
                    }
                })
            })
    }

    /// Stable sort: candidates with equal keys keep their merge order.
    pub fn rank(&self, candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}
