//! Concurrent candidate aggregation with a per-identity cache.
//!
//! Fans out to every enabled [`CandidateSource`], merges in source order and
//! drops mismatched titles. The matched set is cached until it is explicitly
//! invalidated; duplicates, disabled sources and ranking are resolved per
//! call, so a cache hit still honours the caller's policy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use super::candidate::{Candidate, SourceId};
use super::matching::{normalize, TitleMatcher};
use super::ranking::RankingPolicy;
use super::source::CandidateSource;
use crate::media::ContentIdentity;

type InFlight = Shared<BoxFuture<'static, Arc<Matched>>>;

/// Per-resolution snapshot of the settings the aggregator depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    pub ranking: RankingPolicy,
    /// Sources skipped for this resolution.
    #[serde(default)]
    pub disabled: HashSet<SourceId>,
}

impl AggregationPolicy {
    /// Drop disabled sources, then duplicates, then rank what is left.
    fn select(&self, matched: &[Candidate]) -> Vec<Candidate> {
        let mut candidates = dedupe(
            matched
                .iter()
                .filter(|c| !self.disabled.contains(&c.source))
                .cloned(),
        );
        self.ranking.rank(&mut candidates);
        candidates
    }
}

/// Title-matched candidates in merge order, and which sources produced them.
#[derive(Debug)]
struct Matched {
    candidates: Vec<Candidate>,
    queried: HashSet<SourceId>,
}

/// Aggregates and caches candidates per content identity.
///
/// Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct CandidateAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    sources: Vec<Arc<dyn CandidateSource>>,
    cache: RwLock<HashMap<ContentIdentity, Arc<Matched>>>,
    in_flight: Mutex<HashMap<ContentIdentity, InFlight>>,
}

impl CandidateAggregator {
    pub fn new(sources: Vec<Arc<dyn CandidateSource>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources,
                cache: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Configured sources, in merge order.
    pub fn sources(&self) -> Vec<SourceId> {
        self.inner.sources.iter().map(|s| s.id().clone()).collect()
    }

    /// Ranked candidates for `identity`, from cache when available.
    ///
    /// Never fails: no streams is an empty list. Concurrent calls for the
    /// same identity share a single fetch. A cached set is reused only when
    /// it already covers every source `policy` enables.
    #[instrument(skip(self, title, policy), fields(id = %identity))]
    pub async fn resolve(
        &self,
        identity: &ContentIdentity,
        title: &str,
        policy: &AggregationPolicy,
    ) -> Vec<Candidate> {
        let fetch = {
            let mut in_flight = self.inner.in_flight.lock().await;

            if let Some(cached) = self.inner.cache.read().await.get(identity) {
                if self.inner.covers(cached, policy) {
                    let candidates = policy.select(&cached.candidates);
                    debug!(count = candidates.len(), "Returning cached candidates");
                    return candidates;
                }
                debug!("Cached candidates miss a newly enabled source");
            }

            if let Some(existing) = in_flight.get(identity) {
                debug!("Joining in-flight aggregation");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let key = identity.clone();
                let title = title.to_string();
                let disabled = policy.disabled.clone();
                let fetch = async move { inner.aggregate(key, title, disabled).await }
                    .boxed()
                    .shared();
                in_flight.insert(identity.clone(), fetch.clone());
                // Runs to completion even if every caller stops waiting, so
                // the cache still warms up.
                tokio::spawn(fetch.clone());
                fetch
            }
        };

        policy.select(&fetch.await.candidates)
    }

    /// Cached candidates in merge order without triggering a fetch.
    pub async fn cached(&self, identity: &ContentIdentity) -> Option<Vec<Candidate>> {
        self.inner
            .cache
            .read()
            .await
            .get(identity)
            .map(|matched| dedupe(matched.candidates.iter().cloned()))
    }

    pub async fn invalidate(&self, identity: &ContentIdentity) {
        self.inner.cache.write().await.remove(identity);
    }

    pub async fn clear(&self) {
        self.inner.cache.write().await.clear();
    }
}

impl Inner {
    fn covers(&self, matched: &Matched, policy: &AggregationPolicy) -> bool {
        self.sources
            .iter()
            .map(|s| s.id())
            .filter(|id| !policy.disabled.contains(*id))
            .all(|id| matched.queried.contains(id))
    }

    async fn aggregate(
        self: Arc<Self>,
        identity: ContentIdentity,
        title: String,
        disabled: HashSet<SourceId>,
    ) -> Arc<Matched> {
        let enabled: Vec<_> = self
            .sources
            .iter()
            .filter(|s| !disabled.contains(s.id()))
            .collect();

        let fetches = enabled.iter().map(|source| source.fetch(&identity));
        let results = futures::future::join_all(fetches).await;

        let merged: Vec<Candidate> = results.into_iter().flatten().collect();
        let fetched = merged.len();

        // Filter before dedupe so a mismatched entry never shadows a good
        // one with the same URL.
        let matcher = TitleMatcher::new(&title);
        let candidates: Vec<Candidate> = merged
            .into_iter()
            .filter(|c| matcher.matches(&c.title))
            .collect();

        info!(
            id = %identity,
            sources = enabled.len(),
            fetched,
            kept = candidates.len(),
            "Aggregated candidates"
        );

        let matched = Arc::new(Matched {
            candidates,
            queried: enabled.iter().map(|s| s.id().clone()).collect(),
        });
        if !matched.candidates.is_empty() {
            self.cache
                .write()
                .await
                .insert(identity.clone(), Arc::clone(&matched));
        }
        self.in_flight.lock().await.remove(&identity);

        matched
    }
}

fn title_key(title: &str) -> String {
    normalize(title).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop repeats of a URL, or of a normalized title from the same source.
fn dedupe(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut urls = HashSet::new();
    let mut titles = HashSet::new();

    candidates
        .into_iter()
        .filter(|c| {
            let title_key = (title_key(&c.title), c.source.clone());
            let new_url = !urls.contains(c.url.as_str());
            let new_title = !titles.contains(&title_key);
            if new_url && new_title {
                urls.insert(c.url.as_str().to_string());
                titles.insert(title_key);
                true
            } else {
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::candidate::QualityTier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    struct FakeSource {
        id: SourceId,
        streams: Vec<(&'static str, &'static str)>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(id: &str, streams: Vec<(&'static str, &'static str)>) -> Arc<Self> {
            Self::delayed(id, streams, Duration::ZERO)
        }

        fn delayed(id: &str, streams: Vec<(&'static str, &'static str)>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: SourceId::from(id),
                streams,
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CandidateSource for FakeSource {
        fn id(&self) -> &SourceId {
            &self.id
        }

        async fn fetch(&self, _identity: &ContentIdentity) -> Vec<Candidate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.streams
                .iter()
                .map(|(title, url)| Candidate::new(*title, Url::parse(url).unwrap(), self.id.clone()))
                .collect()
        }
    }

    fn sources(list: Vec<Arc<FakeSource>>) -> Vec<Arc<dyn CandidateSource>> {
        list.into_iter()
            .map(|s| s as Arc<dyn CandidateSource>)
            .collect()
    }

    fn identity() -> ContentIdentity {
        ContentIdentity::episode("tt1", 1, 2)
    }

    #[tokio::test]
    async fn filters_mismatched_titles() {
        let a = FakeSource::new("A", vec![("Show.S01E02.1080p", "http://x/a.mp4")]);
        let b = FakeSource::new("B", vec![("Unrelated Movie 2010", "http://x/b.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a, b]));

        let result = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].url.as_str(), "http://x/a.mp4");
        assert_eq!(result[0].quality, QualityTier::P1080);
    }

    #[tokio::test]
    async fn merge_order_ignores_completion_order() {
        let slow = FakeSource::delayed("Slow", vec![("Show 720p", "http://x/slow.mp4")], Duration::from_millis(50));
        let fast = FakeSource::new("Fast", vec![("Show 720p", "http://x/fast.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![slow, fast]));

        let result = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        let urls: Vec<_> = result.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x/slow.mp4", "http://x/fast.mp4"]);
    }

    #[tokio::test]
    async fn duplicates_keep_first_occurrence() {
        let a = FakeSource::new(
            "A",
            vec![
                ("Show 1080p", "http://x/1.mp4"),
                ("Show 1080p", "http://x/2.mp4"),
                ("Show 720p", "http://x/1.mp4"),
            ],
        );
        let b = FakeSource::new("B", vec![("Show 1080p", "http://x/3.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a, b]));

        let result = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        let urls: Vec<_> = result.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x/1.mp4", "http://x/3.mp4"]);
    }

    #[tokio::test]
    async fn caches_non_empty_results() {
        let a = FakeSource::new("A", vec![("Show", "http://x/a.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a.clone()]));
        let policy = AggregationPolicy::default();

        agg.resolve(&identity(), "Show", &policy).await;
        agg.resolve(&identity(), "Show", &policy).await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert!(agg.cached(&identity()).await.is_some());

        agg.invalidate(&identity()).await;
        agg.resolve(&identity(), "Show", &policy).await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_results_are_not_cached() {
        let a = FakeSource::new("A", vec![("Other Title", "http://x/a.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a.clone()]));
        let policy = AggregationPolicy::default();

        assert!(agg.resolve(&identity(), "Show", &policy).await.is_empty());
        assert!(agg.resolve(&identity(), "Show", &policy).await.is_empty());
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
        assert!(agg.cached(&identity()).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_fetch() {
        let a = FakeSource::delayed("A", vec![("Show", "http://x/a.mp4")], Duration::from_millis(50));
        let agg = CandidateAggregator::new(sources(vec![a.clone()]));
        let policy = AggregationPolicy::default();

        let id = identity();
        let (r1, r2) = tokio::join!(
            agg.resolve(&id, "Show", &policy),
            agg.resolve(&id, "Show", &policy)
        );
        assert_eq!(r1, r2);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_sources_are_skipped() {
        let a = FakeSource::new("A", vec![("Show", "http://x/a.mp4")]);
        let b = FakeSource::new("B", vec![("Show", "http://x/b.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a.clone(), b.clone()]));
        let policy = AggregationPolicy {
            disabled: HashSet::from([SourceId::from("A")]),
            ..Default::default()
        };

        let result = agg.resolve(&identity(), "Show", &policy).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source.as_str(), "B");
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ranking_applies_policy() {
        let a = FakeSource::new("A", vec![("Show 4K", "http://x/uhd.mp4"), ("Show 720p", "http://x/720.mp4")]);
        let b = FakeSource::new("B", vec![("Show 1080p", "http://x/1080.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a, b]));
        let policy = AggregationPolicy {
            ranking: RankingPolicy {
                quality_ceiling: QualityTier::P1080,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = agg.resolve(&identity(), "Show", &policy).await;
        let tiers: Vec<_> = result.iter().map(|c| c.quality).collect();
        assert_eq!(tiers, vec![QualityTier::P1080, QualityTier::P720, QualityTier::Uhd]);
    }

    #[tokio::test]
    async fn mismatched_duplicate_does_not_shadow_match() {
        let a = FakeSource::new("A", vec![("Unrelated Movie 2010", "http://x/same.mp4")]);
        let b = FakeSource::new("B", vec![("Show.S01E02.1080p", "http://x/same.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a, b]));

        let result = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source.as_str(), "B");
        assert_eq!(result[0].title, "Show.S01E02.1080p");
    }

    #[tokio::test]
    async fn cache_hit_honours_caller_policy() {
        let a = FakeSource::new("A", vec![("Show 1080p", "http://x/a.mp4")]);
        let b = FakeSource::new("B", vec![("Show 720p", "http://x/b.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a.clone(), b.clone()]));

        let first = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        assert_eq!(first[0].source.as_str(), "A");

        let sticky = AggregationPolicy {
            ranking: RankingPolicy {
                sticky_source: Some(SourceId::from("B")),
                ..Default::default()
            },
            ..Default::default()
        };
        let second = agg.resolve(&identity(), "Show", &sticky).await;
        let order: Vec<_> = second.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);

        let without_a = AggregationPolicy {
            disabled: HashSet::from([SourceId::from("A")]),
            ..sticky
        };
        let third = agg.resolve(&identity(), "Show", &without_a).await;
        let order: Vec<_> = third.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(order, vec!["B"]);

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shared_duplicate_reappears_when_first_source_is_disabled() {
        let a = FakeSource::new("A", vec![("Show 1080p", "http://x/same.mp4")]);
        let b = FakeSource::new("B", vec![("Show 1080p", "http://x/same.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a, b]));

        let all = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source.as_str(), "A");

        let policy = AggregationPolicy {
            disabled: HashSet::from([SourceId::from("A")]),
            ..Default::default()
        };
        let only_b = agg.resolve(&identity(), "Show", &policy).await;
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].source.as_str(), "B");
    }

    #[tokio::test]
    async fn newly_enabled_source_triggers_refetch() {
        let a = FakeSource::new("A", vec![("Show", "http://x/a.mp4")]);
        let b = FakeSource::new("B", vec![("Show", "http://x/b.mp4")]);
        let agg = CandidateAggregator::new(sources(vec![a.clone(), b.clone()]));
        let without_b = AggregationPolicy {
            disabled: HashSet::from([SourceId::from("B")]),
            ..Default::default()
        };

        agg.resolve(&identity(), "Show", &without_b).await;
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);

        let result = agg.resolve(&identity(), "Show", &AggregationPolicy::default()).await;
        assert_eq!(result.len(), 2);
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);

        // Now fully covered, so either policy is served from cache
        agg.resolve(&identity(), "Show", &without_b).await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    }
}
