#![allow(dead_code)]
use http_client::{Error, HttpClient, Request, Response};
use http_types::{StatusCode, Url};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const TEST_BASE_URL: &str = "http://localhost:8080/2.0/";

#[derive(Debug, Clone)]
enum Scripted {
    Body { status: u16, body: String },
    Failure(String),
}

/// HTTP client that replays canned responses in order and records every URL
/// it was asked for.
///
/// Clones share the script and the recorded URLs, so a test can hand one
/// clone to the client under test and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    urls: Arc<Mutex<Vec<Url>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(self, body: serde_json::Value) -> Self {
        self.respond(200, &body.to_string())
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Scripted::Body {
            status,
            body: body.to_string(),
        });
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(message.to_string()));
        self
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    /// The `method` query parameter of every request, in order.
    pub fn methods(&self) -> Vec<String> {
        self.urls()
            .iter()
            .map(|url| query_param(url, "method").unwrap_or_default())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedClient {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        self.urls.lock().unwrap().push(req.url().clone());

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Body { status, body }) => {
                let mut response = Response::new(status);
                response.set_body(body);
                Ok(response)
            }
            Some(Scripted::Failure(message)) => {
                Err(Error::from_str(StatusCode::InternalServerError, message))
            }
            None => Err(Error::from_str(
                StatusCode::InternalServerError,
                format!("no scripted response for {}", req.url()),
            )),
        }
    }
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub fn user_info(name: &str, playcount: u64) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "name": name,
            "realname": "",
            "playcount": playcount.to_string(),
            "url": format!("https://www.last.fm/user/{name}")
        }
    })
}

pub fn recent_tracks(name: &str, artist: &str, now_playing: bool) -> serde_json::Value {
    let mut track = serde_json::json!({
        "name": name,
        "artist": {"#text": artist, "mbid": ""},
        "album": {"#text": "Yankee Hotel Foxtrot"},
        "image": [
            {"#text": "https://img/small.png", "size": "small"},
            {"#text": "https://img/large.png", "size": "large"}
        ]
    });
    if now_playing {
        track["@attr"] = serde_json::json!({"nowplaying": "true"});
    } else {
        track["date"] = serde_json::json!({"uts": "1700000000", "#text": "14 Nov 2023, 22:13"});
    }
    serde_json::json!({"recenttracks": {"track": [track], "@attr": {"user": "rj"}}})
}

pub fn similar_artists(artists: &[(&str, &str)]) -> serde_json::Value {
    let artist: Vec<serde_json::Value> = artists
        .iter()
        .map(|(name, similarity)| serde_json::json!({"name": name, "match": similarity}))
        .collect();
    serde_json::json!({"similarartists": {"artist": artist}})
}

pub fn top_tracks(artist: &str, names: &[&str]) -> serde_json::Value {
    let track: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "artist": {"name": artist, "url": ""},
                "image": [{"#text": "", "size": "small"}]
            })
        })
        .collect();
    serde_json::json!({"toptracks": {"track": track}})
}
