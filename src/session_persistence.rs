use crate::types::{LastFmError, Session, Tally, DEFAULT_API_KEY};
use crate::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage key for the Last.fm username.
pub const IDENTITY_KEY: &str = "lfm_username";
/// Storage key for the API key.
pub const TOKEN_KEY: &str = "lfm_apikey";
/// Storage key for the JSON-encoded tally.
pub const TALLY_KEY: &str = "lfm_stats";

/// Flat string key-value storage.
///
/// Implementations use interior mutability so a store can be shared by
/// reference.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn poisoned<T>(_: T) -> LastFmError {
    LastFmError::Storage("storage lock poisoned".to_string())
}

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// The default location follows the XDG Base Directory Specification:
/// `~/.local/share/lastfm-recommender/storage.json`. Every `set` rewrites the
/// file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Get the default storage path using XDG directories.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            LastFmError::Storage("Cannot determine XDG data directory".to_string())
        })?;

        Ok(data_dir.join("lastfm-recommender").join("storage.json"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open a store at `path`. A missing file is an empty store. A file that
    /// isn't a JSON object is ignored with a warning; non-string values in
    /// it are dropped one by one, keeping the rest.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&contents) {
                Ok(object) => string_entries(object, &path),
                Err(e) => {
                    log::warn!("Ignoring unreadable storage file {}: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn string_entries(
    object: serde_json::Map<String, serde_json::Value>,
    path: &Path,
) -> BTreeMap<String, String> {
    object
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(text) => Some((key, text)),
            other => {
                log::warn!("Dropping non-string '{key}' ({other}) from {}", path.display());
                None
            }
        })
        .collect()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LastFmError::Storage(format!("Failed to create storage directory: {e}"))
            })?;
        }

        let json = serde_json::to_string_pretty(&*entries)
            .map_err(|e| LastFmError::Storage(format!("Failed to serialize storage: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| LastFmError::Storage(format!("Failed to write storage file: {e}")))?;

        log::debug!("Saved '{}' to {}", key, self.path.display());
        Ok(())
    }
}

/// Loads and saves the [`Session`] through a [`KeyValueStore`].
///
/// Loading never fails: missing or unreadable values fall back to defaults
/// (no user, the built-in API key, a zero tally).
#[derive(Debug, Clone)]
pub struct SessionPersistence<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SessionPersistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to read '{key}': {e}");
                None
            }
        }
    }

    pub fn load(&self) -> Session {
        let identity = self.read(IDENTITY_KEY).unwrap_or_default();
        let api_token = self
            .read(TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());

        let tally = match self.read(TALLY_KEY) {
            Some(raw) => serde_json::from_str::<Tally>(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable tally {raw:?}: {e}");
                Tally::default()
            }),
            None => Tally::default(),
        };

        Session {
            identity,
            api_token,
            tally,
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let tally = serde_json::to_string(&session.tally)
            .map_err(|e| LastFmError::Storage(format!("Failed to serialize tally: {e}")))?;

        self.store.set(IDENTITY_KEY, &session.identity)?;
        self.store.set(TOKEN_KEY, &session.api_token)?;
        self.store.set(TALLY_KEY, &tally)?;
        Ok(())
    }
}
