//! Playback orchestration.
//!
//! Resolution order: a fresh session entry is reused immediately; a stale
//! one is probed first; otherwise candidates are aggregated and either raced
//! remotely or the top-ranked one is taken. The orchestrator also keeps the
//! ranked list around so a failing stream can be replaced by the next one,
//! and pre-warms the next episode near the end of the current one.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{FailureReason, PlaybackState, Player, ResolutionOrigin, ResolvedStream};
use crate::config::{state_path, FluxConfig, UserState};
use crate::error::{FluxError, Result};
use crate::history::{WatchEvent, WatchHistory};
use crate::http_client::HttpClient;
use crate::media::{ContentIdentity, MediaInfo};
use crate::stream::{
    racer, Candidate, CandidateAggregator, LivenessProbe, RaceCoordinator, SessionCache, SourceId,
};

/// Per-session state, dropped on close or when another resolve starts.
struct ActiveSession {
    id: Uuid,
    media: MediaInfo,
    identity: ContentIdentity,
    config: Arc<FluxConfig>,
    candidates: Vec<Candidate>,
    current: Option<Url>,
    failed: HashSet<Url>,
    preloaded: bool,
    cancel: CancellationToken,
}

struct Inner {
    aggregator: CandidateAggregator,
    racer: RaceCoordinator,
    probe: LivenessProbe,
    sessions: SessionCache,
    player: Arc<dyn Player>,
    history: Arc<dyn WatchHistory>,
    config: RwLock<Arc<FluxConfig>>,
    sticky_source: RwLock<Option<SourceId>>,
    /// Where the sticky source is persisted; in memory only when `None`.
    state_file: Option<PathBuf>,
    active: Mutex<Option<ActiveSession>>,
    state: watch::Sender<PlaybackState>,
}

/// Drives one playback session at a time over shared caches.
///
/// Cloning is cheap; clones share sessions, caches and state.
#[derive(Clone)]
pub struct PlaybackOrchestrator {
    inner: Arc<Inner>,
}

impl PlaybackOrchestrator {
    /// Build an orchestrator with addon clients for every configured addon.
    ///
    /// The sticky source is restored from, and saved to, the state file next
    /// to the config file.
    pub fn new(
        config: FluxConfig,
        player: Arc<dyn Player>,
        history: Arc<dyn WatchHistory>,
    ) -> anyhow::Result<Self> {
        let http = HttpClient::new()?;
        let aggregator = config.aggregator(http.inner());
        Ok(Self::build(
            config,
            aggregator,
            http.inner().clone(),
            player,
            history,
            Some(state_path()),
        ))
    }

    /// Build an orchestrator around an existing aggregator.
    ///
    /// The sticky source lives in memory only.
    pub fn from_parts(
        config: FluxConfig,
        aggregator: CandidateAggregator,
        client: reqwest::Client,
        player: Arc<dyn Player>,
        history: Arc<dyn WatchHistory>,
    ) -> Self {
        Self::build(config, aggregator, client, player, history, None)
    }

    /// Like [`from_parts`](Self::from_parts), persisting the sticky source
    /// in `state_file`.
    pub fn from_parts_persistent(
        config: FluxConfig,
        aggregator: CandidateAggregator,
        client: reqwest::Client,
        player: Arc<dyn Player>,
        history: Arc<dyn WatchHistory>,
        state_file: PathBuf,
    ) -> Self {
        Self::build(config, aggregator, client, player, history, Some(state_file))
    }

    fn build(
        config: FluxConfig,
        aggregator: CandidateAggregator,
        client: reqwest::Client,
        player: Arc<dyn Player>,
        history: Arc<dyn WatchHistory>,
        state_file: Option<PathBuf>,
    ) -> Self {
        let sticky_source = state_file.as_deref().and_then(restore_sticky_source);
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            inner: Arc::new(Inner {
                aggregator,
                racer: RaceCoordinator::new(client.clone()),
                probe: LivenessProbe::new(client),
                sessions: SessionCache::new(),
                player,
                history,
                config: RwLock::new(Arc::new(config)),
                sticky_source: RwLock::new(sticky_source),
                state_file,
                active: Mutex::new(None),
                state,
            }),
        }
    }

    /// Resolve `identity` to a playable URL and make it the active session.
    ///
    /// Fails only with [`FluxError::NoCandidates`], or
    /// [`FluxError::Cancelled`] when the session is closed meanwhile.
    #[instrument(skip(self, media), fields(id = %identity))]
    pub async fn resolve(
        &self,
        media: &MediaInfo,
        identity: ContentIdentity,
    ) -> Result<ResolvedStream> {
        let config = Arc::clone(&*self.inner.config.read().await);
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        *self.inner.active.lock().await = Some(ActiveSession {
            id: session_id,
            media: media.clone(),
            identity: identity.clone(),
            config: Arc::clone(&config),
            candidates: Vec::new(),
            current: None,
            failed: HashSet::new(),
            preloaded: false,
            cancel: cancel.clone(),
        });
        self.inner.publish(PlaybackState::Resolving);

        let result = self
            .inner
            .resolve_session(session_id, &config, media, &identity, &cancel)
            .await;

        if let Err(FluxError::NoCandidates(_)) = &result {
            self.inner
                .transition(session_id, PlaybackState::Failed(FailureReason::NoCandidates))
                .await;
        }
        result
    }

    /// `Resolved → Playing`: hand the URL to the player and record history.
    pub async fn start_playback(&self) -> Result<Url> {
        let (url, event) = {
            let mut active = self.inner.active.lock().await;
            let session = active.as_mut().ok_or(FluxError::NoActiveSession)?;
            let url = session.current.clone().ok_or(FluxError::NoActiveSession)?;
            self.inner.player.play(&url);
            self.inner.publish(PlaybackState::Playing);
            let event = WatchEvent::new(session.identity.clone(), session.media.title.clone(), None);
            (url, event)
        };

        self.inner.record(event).await;
        Ok(url)
    }

    pub fn pause(&self) {
        self.inner.player.pause();
    }

    /// Player progress report.
    ///
    /// Records watch progress and, once per session past the preload
    /// threshold, warms the candidate cache for the next episode. Returns
    /// the episode whose preload this call started.
    pub async fn on_progress(&self, time: f64, duration: f64) -> Option<ContentIdentity> {
        if duration <= 0.0 {
            return None;
        }
        let progress = (time / duration).clamp(0.0, 1.0);

        let (event, preload) = {
            let mut active = self.inner.active.lock().await;
            let session = active.as_mut()?;
            let event = WatchEvent::new(
                session.identity.clone(),
                session.media.title.clone(),
                Some(progress),
            );

            let mut preload = None;
            if !session.preloaded && progress >= session.config.playback.preload_threshold {
                if let Some(next) = session.media.next_episode(&session.identity) {
                    session.preloaded = true;
                    preload = Some((next, session.media.title.clone(), Arc::clone(&session.config)));
                }
            }
            (event, preload)
        };

        self.inner.record(event).await;

        let (next, title, config) = preload?;
        let policy = config.aggregation_policy(self.sticky_source().await);
        let aggregator = self.inner.aggregator.clone();
        let target = next.clone();

        info!(next = %next, "Preloading next episode");
        tokio::spawn(async move {
            let candidates = aggregator.resolve(&target, &title, &policy).await;
            debug!(next = %target, count = candidates.len(), "Next episode preloaded");
        });

        Some(next)
    }

    /// Playback of the current URL failed: switch to the next candidate.
    ///
    /// Only valid while `Playing`; any other state errors with
    /// [`FluxError::NotPlaying`] and is left untouched. Moves past the failed
    /// URL's position in the ranked list and never returns a URL that
    /// already failed in this session. Errors with
    /// [`FluxError::AllCandidatesExhausted`] when nothing is left.
    #[instrument(skip(self))]
    pub async fn report_playback_error(&self) -> Result<Url> {
        let (session_id, identity, cancel, refill) = {
            let active = self.inner.active.lock().await;
            let session = active.as_ref().ok_or(FluxError::NoActiveSession)?;
            let state = *self.inner.state.borrow();
            if state != PlaybackState::Playing {
                debug!(?state, "Ignoring playback error outside playback");
                return Err(FluxError::NotPlaying);
            }
            self.inner.publish(PlaybackState::NextCandidate);
            let refill = session.candidates.is_empty().then(|| {
                (
                    session.media.title.clone(),
                    session.config.aggregation_policy(None),
                )
            });
            (
                session.id,
                session.identity.clone(),
                session.cancel.clone(),
                refill,
            )
        };

        if let Some((title, mut policy)) = refill {
            policy.ranking.sticky_source = self.sticky_source().await;
            let candidates = cancellable(
                &cancel,
                self.inner.aggregator.resolve(&identity, &title, &policy),
            )
            .await?;
            self.inner
                .with_session(session_id, |s| {
                    if s.candidates.is_empty() {
                        s.candidates = candidates;
                    }
                })
                .await;
        }

        let next = self
            .inner
            .with_session(session_id, |s| {
                let failed = s.current.take();
                if let Some(url) = &failed {
                    warn!(%url, "Stream failed during playback");
                    s.failed.insert(url.clone());
                }

                let start = failed
                    .as_ref()
                    .and_then(|url| s.candidates.iter().position(|c| &c.url == url))
                    .map_or(0, |i| i + 1);

                let next = s
                    .candidates
                    .iter()
                    .skip(start)
                    .find(|c| !s.failed.contains(&c.url))
                    .cloned();

                match &next {
                    Some(candidate) => {
                        info!(
                            title = %candidate.title,
                            source = %candidate.source,
                            "Trying next stream"
                        );
                        s.current = Some(candidate.url.clone());
                        self.inner.player.play(&candidate.url);
                        self.inner.publish(PlaybackState::Playing);
                    }
                    None => {
                        warn!("No more streams to try");
                        self.inner.publish(PlaybackState::Failed(
                            FailureReason::AllCandidatesExhausted,
                        ));
                    }
                }
                next
            })
            .await
            .ok_or(FluxError::NoActiveSession)?;

        match next {
            Some(candidate) => {
                self.inner.sessions.store(&identity, candidate.url.clone()).await;
                Ok(candidate.url)
            }
            None => {
                self.inner.sessions.invalidate(&identity).await;
                Err(FluxError::AllCandidatesExhausted(identity))
            }
        }
    }

    /// Ranked candidates of the active session, for manual selection.
    pub async fn list_candidates(&self) -> Vec<Candidate> {
        self.inner
            .active
            .lock()
            .await
            .as_ref()
            .map(|s| s.candidates.clone())
            .unwrap_or_default()
    }

    /// Manual override: play `candidate` and make its source sticky.
    pub async fn select_candidate(&self, candidate: &Candidate) -> Result<ResolvedStream> {
        let (identity, event) = {
            let mut active = self.inner.active.lock().await;
            let session = active.as_mut().ok_or(FluxError::NoActiveSession)?;
            session.current = Some(candidate.url.clone());
            session.failed.remove(&candidate.url);
            self.inner.player.play(&candidate.url);
            self.inner.publish(PlaybackState::Playing);
            let event = WatchEvent::new(session.identity.clone(), session.media.title.clone(), None);
            (session.identity.clone(), event)
        };

        info!(title = %candidate.title, source = %candidate.source, "Selected stream");
        *self.inner.sticky_source.write().await = Some(candidate.source.clone());
        self.inner.persist_sticky_source(Some(candidate.source.clone()));
        self.inner.sessions.store(&identity, candidate.url.clone()).await;
        self.inner.record(event).await;

        Ok(ResolvedStream {
            identity,
            url: candidate.url.clone(),
            origin: ResolutionOrigin::Manual,
            candidate: Some(candidate.clone()),
        })
    }

    /// End the session: cancel its probe/race, stop the player, keep caches.
    pub async fn close(&self) {
        let session = self.inner.active.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            self.inner.player.stop();
            info!(id = %session.identity, "Playback session closed");
        }
        self.inner.publish(PlaybackState::Closed);
    }

    /// Episode after the active one, if any.
    pub async fn next_episode(&self) -> Option<ContentIdentity> {
        let active = self.inner.active.lock().await;
        let session = active.as_ref()?;
        session.media.next_episode(&session.identity)
    }

    pub async fn current_url(&self) -> Option<Url> {
        self.inner.active.lock().await.as_ref()?.current.clone()
    }

    pub async fn current_identity(&self) -> Option<ContentIdentity> {
        Some(self.inner.active.lock().await.as_ref()?.identity.clone())
    }

    pub fn state(&self) -> PlaybackState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state.subscribe()
    }

    pub async fn sticky_source(&self) -> Option<SourceId> {
        self.inner.sticky_source.read().await.clone()
    }

    pub async fn config(&self) -> Arc<FluxConfig> {
        Arc::clone(&*self.inner.config.read().await)
    }

    /// Replace the configuration for resolutions started from now on.
    pub async fn update_config(&self, config: FluxConfig) {
        *self.inner.config.write().await = Arc::new(config);
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.inner.sessions
    }

    pub fn aggregator(&self) -> &CandidateAggregator {
        &self.inner.aggregator
    }
}

impl Inner {
    async fn resolve_session(
        self: &Arc<Self>,
        session_id: Uuid,
        config: &Arc<FluxConfig>,
        media: &MediaInfo,
        identity: &ContentIdentity,
        cancel: &CancellationToken,
    ) -> Result<ResolvedStream> {
        if let Some(entry) = self.sessions.lookup(identity).await {
            if entry.is_fresh(config.playback.freshness()) {
                debug!(age = ?entry.age(), "Session URL fresh, playing immediately");
                return Ok(self
                    .finish_from_session(session_id, config, media, identity, entry.url, ResolutionOrigin::SessionCache)
                    .await);
            }

            info!(age = ?entry.age(), "Session URL stale, validating");
            let alive = cancellable(
                cancel,
                self.probe.is_alive(&entry.url, config.timeouts.probe()),
            )
            .await?;

            if alive {
                self.sessions.touch(identity).await;
                return Ok(self
                    .finish_from_session(session_id, config, media, identity, entry.url, ResolutionOrigin::Revalidated)
                    .await);
            }

            info!("Session URL no longer served, re-resolving");
            self.sessions.invalidate(identity).await;
        }

        self.transition(session_id, PlaybackState::Racing).await;

        let policy = config.aggregation_policy(self.sticky_source.read().await.clone());
        let candidates = cancellable(
            cancel,
            self.aggregator.resolve(identity, &media.title, &policy),
        )
        .await?;

        let Some(top) = candidates.first().cloned() else {
            warn!("No candidates found");
            return Err(FluxError::NoCandidates(identity.clone()));
        };

        self.with_session(session_id, |s| s.candidates.clone_from(&candidates))
            .await;

        let raced = match config.racing.active_endpoint() {
            Some(endpoint) => {
                let shortlist = racer::shortlist(&candidates, config.racing.per_source);
                cancellable(
                    cancel,
                    self.racer.race(endpoint, &shortlist, config.racing.timeout()),
                )
                .await?
            }
            None => None,
        };

        let (url, origin) = match raced {
            Some(winner) => (
                winner.url,
                ResolutionOrigin::Raced {
                    latency_ms: winner.latency_ms,
                },
            ),
            None => {
                info!(title = %top.title, source = %top.source, "Falling back to top-ranked stream");
                (top.url.clone(), ResolutionOrigin::TopRanked)
            }
        };

        self.sessions.store(identity, url.clone()).await;
        self.with_session(session_id, |s| {
            s.current = Some(url.clone());
            self.publish(PlaybackState::Resolved);
        })
        .await;

        let candidate = candidates.into_iter().find(|c| c.url == url);
        Ok(ResolvedStream {
            identity: identity.clone(),
            url,
            origin,
            candidate,
        })
    }

    /// Reuse a session URL and refresh the candidate list in the background.
    async fn finish_from_session(
        self: &Arc<Self>,
        session_id: Uuid,
        config: &Arc<FluxConfig>,
        media: &MediaInfo,
        identity: &ContentIdentity,
        url: Url,
        origin: ResolutionOrigin,
    ) -> ResolvedStream {
        self.with_session(session_id, |s| {
            s.current = Some(url.clone());
            self.publish(PlaybackState::Resolved);
        })
        .await;

        self.schedule_refresh(session_id, Arc::clone(config), media.title.clone(), identity.clone());

        ResolvedStream {
            identity: identity.clone(),
            url,
            origin,
            candidate: None,
        }
    }

    /// Fill the session's candidate list after a delay, so the fetch does not
    /// compete with playback startup.
    fn schedule_refresh(
        self: &Arc<Self>,
        session_id: Uuid,
        config: Arc<FluxConfig>,
        title: String,
        identity: ContentIdentity,
    ) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(config.playback.refresh_delay()).await;
            let policy = config.aggregation_policy(inner.sticky_source.read().await.clone());
            let candidates = inner.aggregator.resolve(&identity, &title, &policy).await;
            debug!(id = %identity, count = candidates.len(), "Background candidate refresh done");
            inner
                .with_session(session_id, |s| {
                    if s.candidates.is_empty() {
                        s.candidates = candidates;
                    }
                })
                .await;
        });
    }

    /// Run `f` against the active session if it is still `session_id`.
    async fn with_session<R>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut ActiveSession) -> R,
    ) -> Option<R> {
        let mut active = self.active.lock().await;
        active.as_mut().filter(|s| s.id == session_id).map(f)
    }

    async fn transition(&self, session_id: Uuid, state: PlaybackState) {
        self.with_session(session_id, |_| self.publish(state)).await;
    }

    fn publish(&self, state: PlaybackState) {
        debug!(?state, "Playback state");
        self.state.send_replace(state);
    }

    fn persist_sticky_source(&self, sticky_source: Option<SourceId>) {
        let Some(path) = &self.state_file else {
            return;
        };
        if let Err(e) = (UserState { sticky_source }).save_to(path) {
            warn!(path = %path.display(), "Failed to save sticky source: {e:#}");
        }
    }

    async fn record(&self, event: WatchEvent) {
        let id = event.identity.clone();
        if let Err(e) = self.history.record(event).await {
            warn!(%id, "Failed to record watch history: {e}");
        }
    }
}

fn restore_sticky_source(path: &Path) -> Option<SourceId> {
    match UserState::load_from(path) {
        Ok(state) => state.sticky_source,
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unreadable state file: {e:#}");
            None
        }
    }
}

/// Await `fut` unless the session is cancelled first.
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        () = cancel.cancelled() => Err(FluxError::Cancelled),
        value = fut => Ok(value),
    }
}
