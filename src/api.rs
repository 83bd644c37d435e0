use crate::config::DEFAULT_BASE_URL;
use crate::types::{
    ClientEvent, ClientEventReceiver, LastFmError, RemoteApiError, RequestInfo,
    SharedEventBroadcaster,
};
use crate::Result;
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// Requests and payloads
// =============================================================================

/// A single call to the Last.fm web service.
///
/// Parameters with empty values are dropped when the request is built, so
/// callers can pass optional fields straight through.
///
/// ```rust
/// use lastfm_recommender::api::ApiRequest;
///
/// let request = ApiRequest::similar_artists("key", "Wilco", 20);
/// assert_eq!(request.method, "artist.getSimilar");
/// assert_eq!(request.param("artist"), Some("Wilco"));
/// assert_eq!(request.param("limit"), Some("20"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: String,
    pub api_key: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(api_key: &str, method: &str) -> Self {
        Self {
            method: method.to_string(),
            api_key: api_key.to_string(),
            params: Vec::new(),
        }
    }

    /// Add a query parameter; empty values are skipped.
    pub fn with_param(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.params.push((key.to_string(), value));
        }
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn user_info(api_key: &str, user: &str) -> Self {
        Self::new(api_key, "user.getInfo").with_param("user", user)
    }

    pub fn recent_tracks(api_key: &str, user: &str, limit: u32) -> Self {
        Self::new(api_key, "user.getRecentTracks")
            .with_param("user", user)
            .with_param("limit", limit)
    }

    pub fn similar_artists(api_key: &str, artist: &str, limit: u32) -> Self {
        Self::new(api_key, "artist.getSimilar")
            .with_param("artist", artist)
            .with_param("limit", limit)
    }

    pub fn top_tracks(api_key: &str, artist: &str, limit: u32) -> Self {
        Self::new(api_key, "artist.getTopTracks")
            .with_param("artist", artist)
            .with_param("limit", limit)
    }
}

/// A successfully transported Last.fm response.
///
/// Last.fm signals most failures inside a 200 response, so a payload is
/// either data or an error body. Neither is raised; callers decide.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Data(Value),
    Error(RemoteApiError),
}

impl ApiPayload {
    /// Classify a decoded JSON body by the presence of an `error` field.
    pub fn from_value(value: Value) -> Self {
        if value.get("error").is_none() {
            return ApiPayload::Data(value);
        }

        match serde_json::from_value::<RemoteApiError>(value.clone()) {
            Ok(remote) => ApiPayload::Error(remote),
            Err(_) => {
                let message = value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .map(|v| match v.as_str() {
                        Some(text) => text.to_string(),
                        None => v.to_string(),
                    })
                    .unwrap_or_default();
                ApiPayload::Error(RemoteApiError { code: 0, message })
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiPayload::Error(_))
    }

    /// Turn an error payload into [`LastFmError::Api`].
    pub fn into_result(self) -> Result<Value> {
        match self {
            ApiPayload::Data(value) => Ok(value),
            ApiPayload::Error(remote) => Err(LastFmError::Api(remote)),
        }
    }
}

pub fn parse_api_payload(body: &str) -> Result<ApiPayload> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| LastFmError::Parse(e.to_string()))?;
    Ok(ApiPayload::from_value(value))
}

// =============================================================================
// CatalogApi trait and implementation
// =============================================================================

/// Access to the Last.fm web service.
///
/// Implementations return [`LastFmError::Transport`] when the request can't be
/// completed and [`LastFmError::Protocol`] on a non-success status. Error
/// bodies come back as [`ApiPayload::Error`].
///
/// When the `mock` feature is enabled, this crate provides `MockCatalogApi`
/// generated by `mockall`.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait(?Send)]
pub trait CatalogApi {
    async fn call(&self, request: &ApiRequest) -> Result<ApiPayload>;
}

#[derive(Clone)]
pub struct LastFmApiClientImpl {
    client: Arc<dyn HttpClient>,
    base_url: String,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl LastFmApiClientImpl {
    pub fn new(client: Box<dyn HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against a different endpoint, e.g. a local test server.
    pub fn with_base_url(client: Box<dyn HttpClient>, base_url: String) -> Self {
        Self::with_shared_broadcaster(client, base_url, Arc::new(SharedEventBroadcaster::new()))
    }

    /// Create a client whose events go to an existing broadcaster.
    pub fn with_shared_broadcaster(
        client: Box<dyn HttpClient>,
        base_url: String,
        broadcaster: Arc<SharedEventBroadcaster>,
    ) -> Self {
        Self {
            client: Arc::from(client),
            base_url,
            broadcaster,
        }
    }

    pub fn subscribe(&self) -> ClientEventReceiver {
        self.broadcaster.subscribe()
    }

    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.broadcaster.latest_event()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full request URL: method, key and `format=json` first, then
    /// every non-empty caller parameter.
    pub fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            self.base_url,
            urlencoding::encode(&request.method),
            urlencoding::encode(&request.api_key),
        );

        for (key, value) in request.params.iter().filter(|(_, v)| !v.is_empty()) {
            url.push('&');
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        url.parse::<Url>()
            .map_err(|e| LastFmError::InvalidInput(format!("Invalid request URL {url}: {e}")))
    }
}

impl std::fmt::Debug for LastFmApiClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastFmApiClientImpl")
            .field("base_url", &self.base_url)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}

#[async_trait(?Send)]
impl CatalogApi for LastFmApiClientImpl {
    async fn call(&self, request: &ApiRequest) -> Result<ApiPayload> {
        let url = self.build_url(request)?;

        let request_info = RequestInfo::from_url_and_method(&url, "GET");
        let request_start = std::time::Instant::now();
        log::debug!("Requesting {}", request_info.short_description());

        self.broadcaster.broadcast_event(ClientEvent::RequestStarted {
            request: request_info.clone(),
        });

        let mut response = self
            .client
            .send(Request::new(Method::Get, url))
            .await
            .map_err(|e| LastFmError::Transport(e.to_string()))?;

        let status: u16 = response.status().into();
        let duration_ms = request_start.elapsed().as_millis() as u64;
        log::debug!(
            "{} -> {} in {}ms",
            request_info.short_description(),
            status,
            duration_ms
        );

        self.broadcaster
            .broadcast_event(ClientEvent::RequestCompleted {
                request: request_info,
                status_code: status,
                duration_ms,
            });

        if !response.status().is_success() {
            return Err(LastFmError::Protocol { status });
        }

        let body = response
            .body_string()
            .await
            .map_err(|e| LastFmError::Transport(e.to_string()))?;

        parse_api_payload(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_are_skipped() {
        let request = ApiRequest::new("key", "user.getInfo")
            .with_param("user", "")
            .with_param("limit", 1);

        assert_eq!(request.param("user"), None);
        assert_eq!(request.param("limit"), Some("1"));
        assert_eq!(request.params.len(), 1);
    }

    #[test]
    fn test_parse_data_payload() {
        let payload = parse_api_payload(r#"{"user": {"name": "rj"}}"#).unwrap();
        assert!(!payload.is_error());
        assert_eq!(payload.into_result().unwrap()["user"]["name"], "rj");
    }

    #[test]
    fn test_parse_error_payload() {
        let payload =
            parse_api_payload(r#"{"error": 6, "message": "User not found", "links": []}"#)
                .unwrap();

        assert_eq!(
            payload,
            ApiPayload::Error(RemoteApiError {
                code: 6,
                message: "User not found".to_string(),
            })
        );
        match payload.into_result() {
            Err(LastFmError::Api(remote)) => assert_eq!(remote.code, 6),
            other => panic!("Expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_odd_error_payload() {
        let payload = parse_api_payload(r#"{"error": "boom"}"#).unwrap();
        match payload {
            ApiPayload::Error(remote) => {
                assert_eq!(remote.code, 0);
                assert_eq!(remote.message, "boom");
            }
            other => panic!("Expected error payload, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_json() {
        match parse_api_payload("<html>502</html>") {
            Err(LastFmError::Parse(_)) => {}
            other => panic!("Expected parse error, got: {other:?}"),
        }
    }
}
