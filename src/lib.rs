pub mod api;
pub mod cancel;
pub mod config;
pub mod parsing;
pub mod queue;
pub mod recommend;
pub mod recommender;
pub mod session_persistence;
pub mod types;

pub use api::{ApiPayload, ApiRequest, CatalogApi, LastFmApiClientImpl};
pub use config::{BuilderConfig, RecommenderConfig};
pub use queue::RecommendationQueue;
pub use recommender::{RefreshOutcome, Recommender};
pub use types::{
    ClientEvent, ClientEventReceiver, LastFmError, NowPlaying, Recommendation, RemoteApiError,
    Session, SharedEventBroadcaster, Tally, Track, DEFAULT_API_KEY,
};

#[cfg(feature = "mock")]
pub use api::MockCatalogApi;

pub type Result<T> = std::result::Result<T, LastFmError>;
