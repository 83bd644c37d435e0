use std::time::Duration;

/// Default Last.fm web service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Limits for the similar-artist fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// How many similar artists to ask Last.fm for
    pub similar_limit: u32,
    /// How many of those artists to fetch top tracks for
    pub candidate_count: usize,
    /// Top tracks requested per candidate artist
    pub tracks_per_artist: u32,
    /// Pause between per-artist requests, to stay under Last.fm's rate limit
    pub inter_call_delay: Option<Duration>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            similar_limit: 20,
            candidate_count: 5,
            tracks_per_artist: 3,
            inter_call_delay: None,
        }
    }
}

impl BuilderConfig {
    /// Number of candidates actually expanded, never more than were requested.
    pub fn effective_candidates(&self) -> usize {
        self.candidate_count.min(self.similar_limit as usize)
    }
}

/// Unified configuration for the recommender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    /// Endpoint the API client talks to
    pub base_url: String,
    /// API key to use when the persisted session has none
    pub api_key: Option<String>,
    /// Recommendations shown per page
    pub page_size: usize,
    /// Fan-out limits
    pub builder: BuilderConfig,
    /// How often the now-playing track is re-fetched
    pub refresh_interval: Duration,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            page_size: 5,
            builder: BuilderConfig::default(),
            refresh_interval: Duration::from_secs(30),
        }
    }
}

impl RecommenderConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Override the API key; empty keys are ignored
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        let api_key = api_key.trim();
        if !api_key.is_empty() {
            self.api_key = Some(api_key.to_string());
        }
        self
    }

    /// Set the page size (at least one)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_builder_config(mut self, builder: BuilderConfig) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_similar_limit(mut self, similar_limit: u32) -> Self {
        self.builder.similar_limit = similar_limit;
        self
    }

    pub fn with_candidate_count(mut self, candidate_count: usize) -> Self {
        self.builder.candidate_count = candidate_count;
        self
    }

    pub fn with_tracks_per_artist(mut self, tracks_per_artist: u32) -> Self {
        self.builder.tracks_per_artist = tracks_per_artist;
        self
    }

    pub fn with_inter_call_delay(mut self, delay: Duration) -> Self {
        self.builder.inter_call_delay = Some(delay).filter(|d| !d.is_zero());
        self
    }

    /// A zero interval is ignored.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.refresh_interval = interval;
        }
        self
    }
}
