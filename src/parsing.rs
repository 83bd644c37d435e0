//! Normalization of Last.fm JSON responses.
//!
//! Last.fm is loose about shapes: a list with one element is often sent as a
//! bare object, artist and album fields are sometimes strings and sometimes
//! objects, and numbers arrive as strings. Everything here resolves those
//! variations at the boundary so the rest of the crate only sees [`Track`].

use crate::types::{LastFmError, NowPlaying, Track};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// =============================================================================
// Shape helpers
// =============================================================================

/// Either a single `T` or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }

    pub fn into_first(self) -> Option<T> {
        self.into_vec().into_iter().next()
    }
}

/// A text value that may be a plain string or an object such as
/// `{"#text": "Radiohead", "mbid": "..."}` or `{"name": "Radiohead"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Object {
        #[serde(rename = "#text", default)]
        text: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Other(Value),
}

impl TextField {
    /// Display text: `#text` when non-empty, else `name`, else the raw value.
    pub fn resolve(self) -> String {
        match self {
            TextField::Plain(text) => text,
            TextField::Object { text, name } => text
                .filter(|t| !t.is_empty())
                .or(name)
                .unwrap_or_default(),
            TextField::Other(Value::Null) => String::new(),
            TextField::Other(Value::String(text)) => text,
            TextField::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Image {
    #[serde(rename = "#text", default)]
    pub text: String,
    #[serde(default)]
    pub size: String,
}

/// Pick the cover URL to show for a set of image variants.
///
/// The first `large` or `extralarge` entry wins if it has a URL; otherwise the
/// first entry with any URL; otherwise the empty string.
pub fn best_image(images: &[Image]) -> String {
    let large = images
        .iter()
        .find(|img| img.size == "large" || img.size == "extralarge");
    if let Some(large) = large.filter(|img| !img.text.is_empty()) {
        return large.text.clone();
    }

    images
        .iter()
        .find(|img| !img.text.is_empty())
        .map(|img| img.text.clone())
        .unwrap_or_default()
}

/// Deserialize a field, treating anything of the wrong shape as absent.
///
/// Last.fm sends an empty string where a list is expected when there are no
/// results.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Parse a number that may arrive as a JSON number or a numeric string.
fn number_from(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

// =============================================================================
// Tracks
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: Option<TextField>,
    #[serde(default)]
    pub album: Option<TextField>,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<OneOrMany<Image>>,
    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<RawDate>,
    #[serde(rename = "@attr", default, deserialize_with = "lenient")]
    pub attr: Option<RawTrackAttr>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDate {
    pub uts: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTrackAttr {
    #[serde(default)]
    pub nowplaying: Option<String>,
}

/// Convert a raw track into the canonical record.
pub fn normalize_track(raw: RawTrack) -> Track {
    let images = raw.image.map(OneOrMany::into_vec).unwrap_or_default();
    let image_url = best_image(&images);

    Track {
        name: raw.name,
        artist: raw.artist.map(TextField::resolve).unwrap_or_default(),
        album: raw
            .album
            .map(TextField::resolve)
            .filter(|album| !album.is_empty()),
        image_url: Some(image_url).filter(|url| !url.is_empty()),
    }
}

/// Normalize every track in a one-or-many field.
pub fn normalize_tracks(raw: OneOrMany<RawTrack>) -> Vec<Track> {
    raw.into_vec().into_iter().map(normalize_track).collect()
}

/// Normalize the first track in a one-or-many field.
///
/// A bare object and a one-element list give the same result.
pub fn normalize_first_track(raw: OneOrMany<RawTrack>) -> Option<Track> {
    raw.into_first().map(normalize_track)
}

// =============================================================================
// Response envelopes
// =============================================================================

#[derive(Deserialize)]
struct RecentTracksResponse {
    #[serde(default, deserialize_with = "lenient")]
    recenttracks: Option<TrackList>,
}

#[derive(Deserialize)]
struct TopTracksResponse {
    #[serde(default, deserialize_with = "lenient")]
    toptracks: Option<TrackList>,
}

#[derive(Deserialize)]
struct TrackList {
    #[serde(default, deserialize_with = "lenient")]
    track: Option<OneOrMany<RawTrack>>,
}

#[derive(Deserialize)]
struct SimilarArtistsResponse {
    #[serde(default, deserialize_with = "lenient")]
    similarartists: Option<SimilarArtistList>,
}

#[derive(Deserialize)]
struct SimilarArtistList {
    #[serde(default, deserialize_with = "lenient")]
    artist: Option<OneOrMany<RawSimilarArtist>>,
}

#[derive(Deserialize)]
struct RawSimilarArtist {
    #[serde(default)]
    name: String,
    #[serde(rename = "match", default)]
    similarity: Option<Value>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    realname: Option<String>,
    #[serde(default)]
    playcount: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

/// An artist Last.fm considers similar to the seed artist.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarArtist {
    pub name: String,
    /// Similarity fraction in `[0, 1]`; 0 when Last.fm didn't report one
    pub similarity: f64,
}

/// The parts of `user.getInfo` shown after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub real_name: Option<String>,
    pub playcount: u64,
    pub url: Option<String>,
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| LastFmError::Parse(format!("Invalid {what} response: {e}")))
}

/// Extract the most recent track from a `user.getRecentTracks` response.
///
/// Returns `Ok(None)` when the user has no listening history.
pub fn parse_now_playing(value: Value) -> Result<Option<NowPlaying>> {
    let response: RecentTracksResponse = from_value(value, "recent tracks")?;
    let Some(raw) = response
        .recenttracks
        .and_then(|list| list.track)
        .and_then(OneOrMany::into_first)
    else {
        return Ok(None);
    };

    let is_live = raw
        .attr
        .as_ref()
        .and_then(|attr| attr.nowplaying.as_deref())
        == Some("true");
    let played_at = raw
        .date
        .as_ref()
        .and_then(|date| number_from(Some(&date.uts)))
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

    Ok(Some(NowPlaying {
        track: normalize_track(raw),
        is_live,
        played_at,
    }))
}

/// Extract similar artists, in Last.fm's order, from `artist.getSimilar`.
pub fn parse_similar_artists(value: Value) -> Result<Vec<SimilarArtist>> {
    let response: SimilarArtistsResponse = from_value(value, "similar artists")?;

    Ok(response
        .similarartists
        .and_then(|list| list.artist)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|artist| !artist.name.is_empty())
        .map(|artist| SimilarArtist {
            similarity: number_from(artist.similarity.as_ref()).unwrap_or(0.0),
            name: artist.name,
        })
        .collect())
}

/// Extract the tracks of an `artist.getTopTracks` response.
pub fn parse_top_tracks(value: Value) -> Result<Vec<Track>> {
    let response: TopTracksResponse = from_value(value, "top tracks")?;

    Ok(response
        .toptracks
        .and_then(|list| list.track)
        .map(normalize_tracks)
        .unwrap_or_default())
}

pub fn parse_user_info(value: Value) -> Result<UserProfile> {
    let response: UserInfoResponse = from_value(value, "user info")?;
    let user = response.user;

    Ok(UserProfile {
        name: user.name,
        real_name: user.realname.filter(|n| !n.is_empty()),
        playcount: number_from(user.playcount.as_ref()).unwrap_or(0.0) as u64,
        url: user.url,
    })
}
