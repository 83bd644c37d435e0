//! Data types for Last.fm recommendations.
//!
//! This module contains the core data structures used throughout the crate:
//! track metadata, recommendations, the persisted session and tally, error
//! types, and the event broadcasting used to tell a front-end when to redraw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};

// ================================================================================================
// TRACK METADATA
// ================================================================================================

/// A music track in canonical form.
///
/// Last.fm returns tracks in several shapes depending on the method called;
/// [`crate::parsing::normalize_track`] folds all of them into this record.
///
/// # Examples
///
/// ```rust
/// use lastfm_recommender::Track;
///
/// let track = Track::new("Paranoid Android", "Radiohead")
///     .with_album("OK Computer");
///
/// assert_eq!(track.album.as_deref(), Some("OK Computer"));
/// assert!(track.image_url.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    /// The track name/title
    pub name: String,
    /// The artist name
    ///
    /// Similar-artist lookups are keyed on this field, so a track with an
    /// empty artist produces no recommendations.
    pub artist: String,
    /// The album name (if available)
    pub album: Option<String>,
    /// URL of the best available cover image (if any)
    pub image_url: Option<String>,
}

impl Track {
    pub fn new(name: &str, artist: &str) -> Self {
        Self {
            name: name.to_string(),
            artist: artist.to_string(),
            album: None,
            image_url: None,
        }
    }

    pub fn with_album(mut self, album: &str) -> Self {
        self.album = Some(album.to_string()).filter(|a| !a.is_empty());
        self
    }

    pub fn with_image_url(mut self, image_url: &str) -> Self {
        self.image_url = Some(image_url.to_string()).filter(|u| !u.is_empty());
        self
    }

    /// Whether this track can seed a similar-artist lookup.
    pub fn has_artist(&self) -> bool {
        !self.artist.trim().is_empty()
    }
}

/// The most recent entry of a user's listening history.
///
/// `is_live` is set when Last.fm flags the track as currently playing;
/// otherwise the entry is the last scrobble and carries its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track: Track,
    pub is_live: bool,
    pub played_at: Option<DateTime<Utc>>,
}

/// A suggested track, derived from an artist similar to what the user is playing.
///
/// # Examples
///
/// ```rust
/// use lastfm_recommender::{Recommendation, Track};
///
/// let rec = Recommendation::new(Track::new("Karma Police", "Radiohead"), "Muse", 0.873);
/// assert_eq!(rec.match_score, 87);
/// assert_eq!(rec.similar_to, "Muse");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub track: Track,
    /// The artist whose similarity produced this suggestion
    pub similar_to: String,
    /// How similar the suggesting artist is, as a percentage (0-100)
    pub match_score: u8,
}

impl Recommendation {
    /// Build a recommendation from a similarity fraction in `[0, 1]`.
    ///
    /// Out-of-range or non-finite fractions are clamped into `0..=100`.
    pub fn new(track: Track, similar_to: &str, similarity: f64) -> Self {
        Self {
            track,
            similar_to: similar_to.to_string(),
            match_score: match_score(similarity),
        }
    }
}

/// Convert Last.fm's `match` fraction into a whole percentage.
pub fn match_score(similarity: f64) -> u8 {
    if !similarity.is_finite() {
        return 0;
    }
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

// ================================================================================================
// SESSION STATE
// ================================================================================================

/// Public demo key used when the user hasn't supplied their own.
pub const DEFAULT_API_KEY: &str = "43693a24660b52cf68f3d27e62ed00ec";

/// Running counters of what the user did with recommendations.
///
/// Counters only ever go up. The serialized field names match the storage
/// layout used by earlier versions of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(rename = "liked", alias = "accepted", default)]
    pub accepted: u64,
    #[serde(rename = "passed", alias = "rejected", default)]
    pub rejected: u64,
    #[serde(default)]
    pub discovered: u64,
}

impl Tally {
    pub fn record_accept(&mut self) {
        self.accepted += 1;
        self.discovered += 1;
    }

    pub fn record_reject(&mut self) {
        self.rejected += 1;
    }
}

/// Everything that survives between runs: who the user is, which API key to
/// use, and their tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Last.fm username
    pub identity: String,
    /// Last.fm API key
    pub api_token: String,
    pub tally: Tally,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: String::new(),
            api_token: DEFAULT_API_KEY.to_string(),
            tally: Tally::default(),
        }
    }
}

impl Session {
    pub fn new(identity: &str, api_token: &str) -> Self {
        Self {
            identity: identity.to_string(),
            api_token: api_token.to_string(),
            tally: Tally::default(),
        }
    }

    /// Whether a user has been connected.
    pub fn is_connected(&self) -> bool {
        !self.identity.is_empty()
    }
}

// ================================================================================================
// ERROR TYPES
// ================================================================================================

/// An error payload returned by Last.fm inside a well-formed response.
///
/// Last.fm reports most failures (unknown user, invalid key, ...) with a 200
/// status and a body like `{"error": 6, "message": "User not found"}`. The API
/// client hands these back as [`crate::api::ApiPayload::Error`] rather than
/// raising them, so every caller must look at the payload before using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Last.fm error {code}: {message}")]
pub struct RemoteApiError {
    #[serde(rename = "error")]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

/// Error types for Last.fm recommendation operations.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use lastfm_recommender::{LastFmError, Recommender, RecommenderConfig};
/// use lastfm_recommender::session_persistence::FileStore;
///
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let store = FileStore::open_default()?;
/// let recommender = Recommender::open(Box::new(http_client), store, RecommenderConfig::default());
///
/// match recommender.connect("username", "").await {
///     Ok(profile) => println!("Connected as {}", profile.name),
///     Err(LastFmError::Api(e)) => eprintln!("Could not find that user: {}", e.message),
///     Err(LastFmError::Transport(msg)) => eprintln!("Network error: {}", msg),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok::<(), LastFmError>(())
/// # });
/// ```
#[derive(Error, Debug)]
pub enum LastFmError {
    /// Network-level failure.
    ///
    /// Connection failures, timeouts, DNS errors, or a body that could not be
    /// read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Last.fm answered with a non-success HTTP status.
    #[error("Unexpected HTTP status {status}")]
    Protocol {
        /// The HTTP status code returned
        status: u16,
    },

    /// The response body was not the JSON we expected.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Last.fm rejected the request with an error payload.
    ///
    /// The API client never returns this variant; flows that need to surface
    /// the payload to the user (connecting, for instance) convert
    /// [`RemoteApiError`] into it.
    #[error(transparent)]
    Api(#[from] RemoteApiError),

    /// The caller passed something unusable, such as an empty username.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing persisted state failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ================================================================================================
// EVENT SYSTEM
// ================================================================================================

/// Request information for client events
///
/// The API key is redacted from `query_params` so events can be logged or
/// displayed safely.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestInfo {
    /// The HTTP method (GET, POST, etc.)
    pub method: String,
    /// The Last.fm API method, e.g. `artist.getSimilar`
    pub api_method: String,
    /// Query parameters as key-value pairs
    pub query_params: Vec<(String, String)>,
    /// Path without query parameters
    pub path: String,
}

impl RequestInfo {
    /// Create RequestInfo from a parsed URL and method
    pub fn from_url_and_method(url: &http_types::Url, method: &str) -> Self {
        let query_params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let value = if k == "api_key" {
                    "<redacted>".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();

        let api_method = query_params
            .iter()
            .find(|(k, _)| k == "method")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        Self {
            method: method.to_string(),
            api_method,
            query_params,
            path: url.path().to_string(),
        }
    }

    /// Get a short description of the request for logging
    pub fn short_description(&self) -> String {
        let params: Vec<String> = self
            .query_params
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "method" | "api_key" | "format"))
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        if params.is_empty() {
            format!("{} {}", self.method, self.api_method)
        } else {
            format!("{} {}({})", self.method, self.api_method, params.join(", "))
        }
    }
}

/// Event type to describe client activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Request started
    RequestStarted {
        /// Request details
        request: RequestInfo,
    },
    /// Request completed (any HTTP status)
    RequestCompleted {
        /// Request details
        request: RequestInfo,
        /// HTTP status code
        status_code: u16,
        /// Duration of the request in milliseconds
        duration_ms: u64,
    },
    /// The now-playing track changed
    NowPlayingUpdated {
        now_playing: NowPlaying,
    },
    /// The recommendation queue was replaced by a fresh build
    RecommendationsRebuilt {
        /// The artist the build was seeded from
        seed_artist: String,
        /// Number of recommendations in the new queue
        count: usize,
    },
    /// A refresh was dropped because another one was still running
    RefreshSkipped,
}

/// Type alias for the broadcast receiver
pub type ClientEventReceiver = broadcast::Receiver<ClientEvent>;

/// Type alias for the watch receiver
pub type ClientEventWatcher = watch::Receiver<Option<ClientEvent>>;

/// Shared event broadcasting state that persists across client clones
#[derive(Clone)]
pub struct SharedEventBroadcaster {
    event_tx: broadcast::Sender<ClientEvent>,
    last_event_tx: watch::Sender<Option<ClientEvent>>,
}

impl SharedEventBroadcaster {
    /// Create a new shared event broadcaster
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> ClientEventReceiver {
        self.event_tx.subscribe()
    }

    /// Watch only the most recent event
    pub fn watch(&self) -> ClientEventWatcher {
        self.last_event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for SharedEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

// ================================================================================================
// TESTS
// ================================================================================================
