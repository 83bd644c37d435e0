use lastfm_recommender::session_persistence::FileStore;
use lastfm_recommender::{LastFmApiClientImpl, LastFmError, Recommender, RecommenderConfig};
use std::env;

pub type CliRecommender = Recommender<LastFmApiClientImpl, FileStore>;

/// Username from the environment, if set and non-blank
pub fn env_username() -> Option<String> {
    env::var("LASTFM_USERNAME")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Build the config from CLI flags, falling back to `LASTFM_API_KEY`.
pub fn build_config(api_key: Option<&str>, page_size: usize) -> RecommenderConfig {
    let mut config = RecommenderConfig::default().with_page_size(page_size);

    let api_key = api_key
        .map(str::to_string)
        .or_else(|| env::var("LASTFM_API_KEY").ok());
    if let Some(api_key) = api_key {
        config = config.with_api_key(&api_key);
    }
    config
}

/// Open the recommender over the native HTTP client and the XDG storage file.
pub fn open_recommender(config: RecommenderConfig) -> Result<CliRecommender, LastFmError> {
    let store = FileStore::open_default()?;
    log::debug!("Using storage file {}", store.path().display());

    let http_client = http_client::native::NativeClient::new();
    Ok(Recommender::open(Box::new(http_client), store, config))
}

/// Make sure there is a user to fetch for.
///
/// A saved user is reused as-is. Otherwise `LASTFM_USERNAME` is verified and
/// saved, which also runs the first refresh. Returns whether that refresh
/// already happened.
pub async fn ensure_connected(recommender: &CliRecommender) -> Result<bool, Box<dyn std::error::Error>> {
    if recommender.is_connected() {
        return Ok(false);
    }

    let Some(username) = env_username() else {
        return Err("No Last.fm user saved. Run `lastfm-recommender connect <username>` \
                    or set LASTFM_USERNAME"
            .into());
    };

    println!("🔐 Connecting as '{username}'...");
    recommender.connect(&username, "").await?;
    Ok(true)
}

/// Parse a 1-based position on the current page into an absolute queue index.
pub fn parse_position(arg: Option<&str>, recommender: &CliRecommender) -> Result<usize, String> {
    let raw = arg.ok_or("Expected a position, e.g. `a 2`")?;
    let position: usize = raw
        .parse()
        .map_err(|_| format!("Invalid position: '{raw}'"))?;

    position
        .checked_sub(1)
        .and_then(|relative| recommender.queue().absolute_index(relative))
        .ok_or_else(|| format!("No recommendation at position {position} on this page"))
}
