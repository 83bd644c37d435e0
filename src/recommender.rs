use crate::api::{ApiRequest, CatalogApi, LastFmApiClientImpl};
use crate::cancel::cancelled;
use crate::config::RecommenderConfig;
use crate::parsing::{parse_now_playing, parse_user_info, UserProfile};
use crate::queue::RecommendationQueue;
use crate::recommend::RecommendationBuilder;
use crate::session_persistence::{KeyValueStore, SessionPersistence};
use crate::types::{
    ClientEvent, ClientEventReceiver, LastFmError, NowPlaying, Recommendation, Session,
    SharedEventBroadcaster,
};
use crate::Result;
use http_client::HttpClient;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;

/// What happened to a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The refresh ran; failures inside it were logged
    Completed,
    /// Another refresh was in flight, so this one was dropped
    Skipped,
}

/// Held while a refresh is running; released on drop, waking anyone
/// waiting for the slot.
struct RefreshGuard<'a> {
    in_flight: &'a Cell<bool>,
    released: &'a Notify,
}

impl<'a> RefreshGuard<'a> {
    fn try_acquire(in_flight: &'a Cell<bool>, released: &'a Notify) -> Option<Self> {
        if in_flight.replace(true) {
            None
        } else {
            Some(Self {
                in_flight,
                released,
            })
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.set(false);
        self.released.notify_waiters();
    }
}

/// Owner of all recommendation state, with one handler per user action.
///
/// Everything runs on one logical thread: handlers take `&self`, state lives
/// in `Cell`/`RefCell`, and no borrow is held across an `.await`. That lets a
/// front-end drive the periodic [`run_auto_refresh`](Self::run_auto_refresh)
/// loop and user input side by side (e.g. with `tokio::join!`). Refreshes are
/// single-flight: a refresh started while another is running is skipped.
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_recommender::session_persistence::MemoryStore;
/// use lastfm_recommender::{Recommender, RecommenderConfig};
///
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let recommender = Recommender::open(
///     Box::new(http_client),
///     MemoryStore::new(),
///     RecommenderConfig::default(),
/// );
///
/// let profile = recommender.connect("rj", "").await?;
/// println!("Connected as {} ({} scrobbles)", profile.name, profile.playcount);
///
/// for rec in recommender.current_page_items() {
///     println!("{} - {} ({}% match)", rec.track.artist, rec.track.name, rec.match_score);
/// }
/// recommender.accept(recommender.page_start())?;
/// # Ok::<(), lastfm_recommender::LastFmError>(())
/// # });
/// ```
pub struct Recommender<A: CatalogApi, S: KeyValueStore> {
    api: A,
    persistence: SessionPersistence<S>,
    config: RecommenderConfig,
    session: RefCell<Session>,
    now_playing: RefCell<Option<NowPlaying>>,
    queue: RefCell<RecommendationQueue>,
    refresh_in_flight: Cell<bool>,
    refresh_released: Notify,
    now_playing_seq: Cell<u64>,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl<S: KeyValueStore> Recommender<LastFmApiClientImpl, S> {
    /// Create a recommender talking to Last.fm over `client`.
    ///
    /// API request events and recommender events share one broadcaster.
    pub fn open(client: Box<dyn HttpClient>, store: S, config: RecommenderConfig) -> Self {
        let broadcaster = Arc::new(SharedEventBroadcaster::new());
        let api = LastFmApiClientImpl::with_shared_broadcaster(
            client,
            config.base_url.clone(),
            broadcaster.clone(),
        );
        Self::with_broadcaster(api, store, config, broadcaster)
    }
}

impl<A: CatalogApi, S: KeyValueStore> Recommender<A, S> {
    /// Create a recommender, restoring the persisted session from `store`.
    ///
    /// An API key in `config` takes precedence over the stored one.
    pub fn new(api: A, store: S, config: RecommenderConfig) -> Self {
        Self::with_broadcaster(api, store, config, Arc::new(SharedEventBroadcaster::new()))
    }

    pub fn with_broadcaster(
        api: A,
        store: S,
        config: RecommenderConfig,
        broadcaster: Arc<SharedEventBroadcaster>,
    ) -> Self {
        let persistence = SessionPersistence::new(store);
        let mut session = persistence.load();
        if let Some(api_key) = &config.api_key {
            session.api_token = api_key.clone();
        }
        log::debug!(
            "Loaded session for '{}' ({} liked, {} passed)",
            session.identity,
            session.tally.accepted,
            session.tally.rejected
        );

        Self {
            api,
            persistence,
            queue: RefCell::new(RecommendationQueue::new(config.page_size)),
            config,
            session: RefCell::new(session),
            now_playing: RefCell::new(None),
            refresh_in_flight: Cell::new(false),
            refresh_released: Notify::new(),
            now_playing_seq: Cell::new(0),
            broadcaster,
        }
    }

    pub fn subscribe(&self) -> ClientEventReceiver {
        self.broadcaster.subscribe()
    }

    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.broadcaster.latest_event()
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_connected()
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.now_playing.borrow().clone()
    }

    /// Snapshot of the queue and its page cursor.
    pub fn queue(&self) -> RecommendationQueue {
        self.queue.borrow().clone()
    }

    pub fn current_page_items(&self) -> Vec<Recommendation> {
        self.queue.borrow().current_items().to_vec()
    }

    pub fn current_page(&self) -> usize {
        self.queue.borrow().current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.queue.borrow().total_pages()
    }

    /// Queue index of the first item on the current page.
    pub fn page_start(&self) -> usize {
        self.queue.borrow().page_start()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight.get()
    }

    fn persist(&self) -> Result<()> {
        let session = self.session.borrow().clone();
        self.persistence.save(&session)
    }

    // -------------------------------------------------------------------------
    // Connect / settings
    // -------------------------------------------------------------------------

    /// Verify and store a Last.fm username, then run a full refresh.
    ///
    /// An empty `api_token` keeps the current key. Unknown users come back as
    /// [`LastFmError::Api`]; network trouble as [`LastFmError::Transport`].
    /// Nothing is changed or saved unless the user checks out. If another
    /// refresh is running, this waits for it and then refreshes for the new
    /// user; responses still in flight for a previous user are dropped.
    pub async fn connect(&self, identity: &str, api_token: &str) -> Result<UserProfile> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(LastFmError::InvalidInput(
                "Please enter your Last.fm username".to_string(),
            ));
        }

        let api_token = match api_token.trim() {
            "" => self.session.borrow().api_token.clone(),
            token => token.to_string(),
        };

        let request = ApiRequest::user_info(&api_token, identity);
        let payload = self.api.call(&request).await?;
        let profile = parse_user_info(payload.into_result()?)?;
        log::info!("Connected as '{}'", profile.name);

        let switched_user = {
            let mut session = self.session.borrow_mut();
            let switched = session.identity != identity;
            session.identity = identity.to_string();
            session.api_token = api_token;
            switched
        };
        if switched_user {
            self.now_playing_seq.set(self.now_playing_seq.get() + 1);
            self.now_playing.borrow_mut().take();
            self.queue.borrow_mut().replace(Vec::new());
        }

        self.persist()?;
        self.refresh_when_idle().await;
        Ok(profile)
    }

    /// Run a full refresh, waiting out one already in flight instead of
    /// skipping.
    async fn refresh_when_idle(&self) {
        loop {
            let released = self.refresh_released.notified();
            if self.refresh().await == RefreshOutcome::Completed {
                return;
            }
            log::debug!("Waiting for in-flight refresh before refreshing");
            released.await;
        }
    }

    fn try_begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        RefreshGuard::try_acquire(&self.refresh_in_flight, &self.refresh_released)
    }

    fn is_current_identity(&self, identity: &str) -> bool {
        self.session.borrow().identity == identity
    }

    /// The username to prefill when the settings form is opened.
    pub fn open_settings(&self) -> String {
        self.session.borrow().identity.clone()
    }

    // -------------------------------------------------------------------------
    // Refresh pipeline
    // -------------------------------------------------------------------------

    /// Manual refresh: re-fetch now playing, then rebuild recommendations.
    ///
    /// Failures are logged and the previous state stays in place.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = self.try_begin_refresh() else {
            log::debug!("Refresh already in flight, skipping");
            self.broadcaster.broadcast_event(ClientEvent::RefreshSkipped);
            return RefreshOutcome::Skipped;
        };

        if let Err(e) = self.fetch_now_playing().await {
            log::warn!("Error fetching now playing: {e}");
        }
        if let Err(e) = self.rebuild_recommendations().await {
            log::warn!("Error generating recommendations: {e}");
        }
        RefreshOutcome::Completed
    }

    /// Periodic tick: re-fetch now playing only, unless a refresh is running.
    pub async fn refresh_now_playing(&self) -> RefreshOutcome {
        let Some(_guard) = self.try_begin_refresh() else {
            log::debug!("Refresh in flight, skipping now-playing tick");
            self.broadcaster.broadcast_event(ClientEvent::RefreshSkipped);
            return RefreshOutcome::Skipped;
        };

        if let Err(e) = self.fetch_now_playing().await {
            log::warn!("Error fetching now playing: {e}");
        }
        RefreshOutcome::Completed
    }

    /// Fetch the user's latest track and make it the current one.
    ///
    /// An empty history leaves the current track alone. If a newer request
    /// was issued while this one was outstanding, its response is dropped and
    /// the current state returned instead.
    pub async fn fetch_now_playing(&self) -> Result<Option<NowPlaying>> {
        let (identity, api_token) = {
            let session = self.session.borrow();
            (session.identity.clone(), session.api_token.clone())
        };
        if identity.is_empty() {
            return Err(LastFmError::InvalidInput("No Last.fm user connected".to_string()));
        }

        let ticket = self.now_playing_seq.get() + 1;
        self.now_playing_seq.set(ticket);

        let request = ApiRequest::recent_tracks(&api_token, &identity, 1);
        let payload = self.api.call(&request).await?;
        let latest = parse_now_playing(payload.into_result()?)?;

        if self.now_playing_seq.get() != ticket || !self.is_current_identity(&identity) {
            log::debug!("Discarding superseded now-playing response for '{identity}'");
            return Ok(self.now_playing());
        }

        let Some(latest) = latest else {
            log::debug!("'{identity}' has no listening history");
            return Ok(self.now_playing());
        };

        let changed = self.now_playing.borrow().as_ref() != Some(&latest);
        if changed {
            log::info!("Now playing: {} - {}", latest.track.artist, latest.track.name);
            *self.now_playing.borrow_mut() = Some(latest.clone());
            self.broadcaster
                .broadcast_event(ClientEvent::NowPlayingUpdated {
                    now_playing: latest.clone(),
                });
        }
        Ok(Some(latest))
    }

    /// Replace the queue with recommendations seeded from the current track.
    ///
    /// Returns the new queue length, or `None` when there is no current track
    /// to seed from. On error the old queue is kept.
    pub async fn rebuild_recommendations(&self) -> Result<Option<usize>> {
        let Some(current) = self.now_playing.borrow().as_ref().map(|n| n.track.clone()) else {
            return Ok(None);
        };
        let (identity, api_token) = {
            let session = self.session.borrow();
            (session.identity.clone(), session.api_token.clone())
        };

        let builder = RecommendationBuilder::new(&self.api, &api_token, &self.config.builder);
        let recommendations = builder.build(&current).await?;
        let count = recommendations.len();

        if !self.is_current_identity(&identity) {
            log::debug!("Discarding recommendations built for '{identity}'");
            return Ok(None);
        }

        self.queue.borrow_mut().replace(recommendations);
        log::info!("{count} recommendations similar to '{}'", current.artist);
        self.broadcaster
            .broadcast_event(ClientEvent::RecommendationsRebuilt {
                seed_artist: current.artist,
                count,
            });
        Ok(Some(count))
    }

    /// Tick [`refresh_now_playing`](Self::refresh_now_playing) every
    /// `refresh_interval` until `cancel_rx` flips to true.
    ///
    /// The first tick comes one full interval after the call, since callers
    /// normally refresh on startup. The period is at least one millisecond.
    pub async fn run_auto_refresh(&self, mut cancel_rx: watch::Receiver<bool>) {
        let period = self.config.refresh_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh_now_playing().await;
                }
                _ = cancelled(&mut cancel_rx) => {
                    log::debug!("Auto refresh stopped");
                    break;
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Queue actions
    // -------------------------------------------------------------------------

    /// Returns whether the page changed.
    pub fn next_page(&self) -> bool {
        self.queue.borrow_mut().next_page()
    }

    /// Returns whether the page changed.
    pub fn previous_page(&self) -> bool {
        self.queue.borrow_mut().previous_page()
    }

    /// Like the recommendation at absolute queue `index`.
    ///
    /// Counts toward both liked and discovered. Returns `Ok(None)`, with the
    /// tally untouched, if there is nothing at `index`.
    pub fn accept(&self, index: usize) -> Result<Option<Recommendation>> {
        let Some(rec) = self.queue.borrow_mut().remove(index) else {
            return Ok(None);
        };
        self.session.borrow_mut().tally.record_accept();
        log::info!("Liked: {} - {}", rec.track.artist, rec.track.name);
        self.persist()?;
        Ok(Some(rec))
    }

    /// Pass on the recommendation at absolute queue `index`.
    pub fn reject(&self, index: usize) -> Result<Option<Recommendation>> {
        let Some(rec) = self.queue.borrow_mut().remove(index) else {
            return Ok(None);
        };
        self.session.borrow_mut().tally.record_reject();
        log::debug!("Passed: {} - {}", rec.track.artist, rec.track.name);
        self.persist()?;
        Ok(Some(rec))
    }
}
