use crate::api::{ApiRequest, CatalogApi};
use crate::config::BuilderConfig;
use crate::parsing::{parse_similar_artists, parse_top_tracks, SimilarArtist};
use crate::types::{Recommendation, Track};
use crate::Result;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle in place (Fisher-Yates).
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Expands the track a user is playing into a list of suggestions.
///
/// The fan-out is sequential: one similar-artist lookup, then one top-tracks
/// lookup per candidate artist, each awaited before the next starts.
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_recommender::api::LastFmApiClientImpl;
/// use lastfm_recommender::config::BuilderConfig;
/// use lastfm_recommender::recommend::RecommendationBuilder;
/// use lastfm_recommender::{Track, DEFAULT_API_KEY};
///
/// # tokio_test::block_on(async {
/// let api = LastFmApiClientImpl::new(Box::new(http_client::native::NativeClient::new()));
/// let config = BuilderConfig::default();
/// let builder = RecommendationBuilder::new(&api, DEFAULT_API_KEY, &config);
///
/// let recs = builder.build(&Track::new("Jesus, Etc.", "Wilco")).await?;
/// for rec in recs {
///     println!("{} - {} ({}% like {})", rec.track.artist, rec.track.name, rec.match_score, rec.similar_to);
/// }
/// # Ok::<(), lastfm_recommender::LastFmError>(())
/// # });
/// ```
pub struct RecommendationBuilder<'a, A: CatalogApi + ?Sized> {
    api: &'a A,
    api_key: &'a str,
    config: &'a BuilderConfig,
}

impl<'a, A: CatalogApi + ?Sized> RecommendationBuilder<'a, A> {
    pub fn new(api: &'a A, api_key: &'a str, config: &'a BuilderConfig) -> Self {
        Self {
            api,
            api_key,
            config,
        }
    }

    /// Build a shuffled recommendation list for `current`.
    ///
    /// An empty list is a valid result: the track has no artist, Last.fm knows
    /// no similar artists, or none of them returned tracks. Only a failure of
    /// the similar-artist lookup itself is returned as an error.
    pub async fn build(&self, current: &Track) -> Result<Vec<Recommendation>> {
        let mut recommendations = self.collect(current).await?;
        shuffle(&mut recommendations, &mut rand::thread_rng());
        Ok(recommendations)
    }

    /// Same as [`build`](Self::build), with a caller-supplied RNG.
    pub async fn build_with_rng<R: Rng + ?Sized>(
        &self,
        current: &Track,
        rng: &mut R,
    ) -> Result<Vec<Recommendation>> {
        let mut recommendations = self.collect(current).await?;
        shuffle(&mut recommendations, rng);
        Ok(recommendations)
    }

    /// Gather recommendations in Last.fm's order, before shuffling.
    pub async fn collect(&self, current: &Track) -> Result<Vec<Recommendation>> {
        if !current.has_artist() {
            log::debug!("'{}' has no artist, nothing to recommend", current.name);
            return Ok(Vec::new());
        }

        let similar = self.similar_artists(&current.artist).await?;
        if similar.is_empty() {
            log::info!("No similar artists found for '{}'", current.artist);
            return Ok(Vec::new());
        }

        let mut recommendations = Vec::new();
        let candidates = similar.iter().take(self.config.effective_candidates());

        for (i, candidate) in candidates.enumerate() {
            if i > 0 {
                if let Some(delay) = self.config.inter_call_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.top_tracks(&candidate.name).await {
                Ok(tracks) => {
                    log::debug!(
                        "{} top tracks from '{}' (match {:.2})",
                        tracks.len(),
                        candidate.name,
                        candidate.similarity
                    );
                    recommendations.extend(tracks.into_iter().map(|track| {
                        Recommendation::new(track, &current.artist, candidate.similarity)
                    }));
                }
                Err(e) => {
                    log::warn!("Skipping tracks for '{}': {}", candidate.name, e);
                }
            }
        }

        Ok(recommendations)
    }

    async fn similar_artists(&self, artist: &str) -> Result<Vec<SimilarArtist>> {
        let request = ApiRequest::similar_artists(self.api_key, artist, self.config.similar_limit);
        let value = self.api.call(&request).await?.into_result()?;
        parse_similar_artists(value)
    }

    async fn top_tracks(&self, artist: &str) -> Result<Vec<Track>> {
        let request = ApiRequest::top_tracks(self.api_key, artist, self.config.tracks_per_artist);
        let value = self.api.call(&request).await?.into_result()?;
        parse_top_tracks(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiPayload, MockCatalogApi};
    use crate::types::{LastFmError, RemoteApiError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    fn similar(artists: &[(&str, &str)]) -> Value {
        let artist: Vec<Value> = artists
            .iter()
            .map(|(name, score)| json!({"name": name, "match": score}))
            .collect();
        json!({"similarartists": {"artist": artist, "@attr": {"artist": "A"}}})
    }

    fn top_tracks(artist: &str, names: &[&str]) -> Value {
        let track: Vec<Value> = names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "artist": {"name": artist},
                    "image": [{"#text": format!("https://img/{name}.png"), "size": "large"}]
                })
            })
            .collect();
        json!({"toptracks": {"track": track}})
    }

    fn two_artist_api() -> MockCatalogApi {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .times(3)
            .returning(|request| match request.method.as_str() {
                "artist.getSimilar" => Ok(ApiPayload::Data(similar(&[
                    ("B", "0.9"),
                    ("C", "0.456"),
                ]))),
                "artist.getTopTracks" => match request.param("artist") {
                    Some("B") => Ok(ApiPayload::Data(top_tracks("B", &["b1", "b2"]))),
                    Some("C") => Ok(ApiPayload::Data(top_tracks("C", &["c1", "c2"]))),
                    other => panic!("unexpected artist {other:?}"),
                },
                other => panic!("unexpected method {other}"),
            });
        api
    }

    #[test_log::test(tokio::test)]
    async fn test_two_similar_artists_give_four_recommendations() {
        let api = two_artist_api();
        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);

        let recs = builder.build(&Track::new("a1", "A")).await.unwrap();

        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|r| r.similar_to == "A"));
        for rec in &recs {
            let expected = if rec.track.artist == "B" { 90 } else { 46 };
            assert_eq!(rec.match_score, expected, "{}", rec.track.name);
        }
    }

    #[tokio::test]
    async fn test_collect_keeps_lastfm_order() {
        let api = two_artist_api();
        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);

        let recs = builder.collect(&Track::new("a1", "A")).await.unwrap();
        let names: Vec<&str> = recs.iter().map(|r| r.track.name.as_str()).collect();
        assert_eq!(names, vec!["b1", "b2", "c1", "c2"]);
        assert_eq!(
            recs[0].track.image_url.as_deref(),
            Some("https://img/b1.png")
        );
    }

    #[tokio::test]
    async fn test_requests_carry_limits() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .withf(|r| {
                r.method == "artist.getSimilar"
                    && r.param("artist") == Some("Wilco")
                    && r.param("limit") == Some("15")
                    && r.api_key == "key"
            })
            .times(1)
            .returning(|_| Ok(ApiPayload::Data(similar(&[("Son Volt", "0.8")]))));
        api.expect_call()
            .withf(|r| {
                r.method == "artist.getTopTracks"
                    && r.param("artist") == Some("Son Volt")
                    && r.param("limit") == Some("2")
            })
            .times(1)
            .returning(|_| Ok(ApiPayload::Data(top_tracks("Son Volt", &["Windfall"]))));

        let config = BuilderConfig {
            similar_limit: 15,
            tracks_per_artist: 2,
            ..Default::default()
        };
        let builder = RecommendationBuilder::new(&api, "key", &config);
        let recs = builder.build(&Track::new("Box Full of Letters", "Wilco")).await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].match_score, 80);
    }

    #[tokio::test]
    async fn test_only_first_candidates_are_expanded() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .withf(|r| r.method == "artist.getSimilar")
            .times(1)
            .returning(|_| {
                let artists: Vec<(String, String)> =
                    (0..8).map(|i| (format!("S{i}"), "0.5".to_string())).collect();
                let refs: Vec<(&str, &str)> = artists
                    .iter()
                    .map(|(n, s)| (n.as_str(), s.as_str()))
                    .collect();
                Ok(ApiPayload::Data(similar(&refs)))
            });
        api.expect_call()
            .withf(|r| r.method == "artist.getTopTracks")
            .times(3)
            .returning(|r| {
                let artist = r.param("artist").unwrap_or_default().to_string();
                Ok(ApiPayload::Data(top_tracks(&artist, &["t"])))
            });

        let config = BuilderConfig {
            candidate_count: 3,
            ..Default::default()
        };
        let builder = RecommendationBuilder::new(&api, "key", &config);
        let recs = builder.collect(&Track::new("x", "A")).await.unwrap();

        let artists: Vec<&str> = recs.iter().map(|r| r.track.artist.as_str()).collect();
        assert_eq!(artists, vec!["S0", "S1", "S2"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_candidate_failures_are_skipped() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .returning(|request| match (request.method.as_str(), request.param("artist")) {
                ("artist.getSimilar", _) => Ok(ApiPayload::Data(similar(&[
                    ("Down", "0.9"),
                    ("Gone", "0.8"),
                    ("Garbled", "0.7"),
                    ("Fine", "0.6"),
                ]))),
                (_, Some("Down")) => Err(LastFmError::Transport("connection reset".to_string())),
                (_, Some("Gone")) => Ok(ApiPayload::Error(RemoteApiError {
                    code: 6,
                    message: "The artist you supplied could not be found".to_string(),
                })),
                (_, Some("Garbled")) => Err(LastFmError::Protocol { status: 502 }),
                (_, Some("Fine")) => Ok(ApiPayload::Data(top_tracks("Fine", &["f1", "f2"]))),
                other => panic!("unexpected request {other:?}"),
            });

        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);
        let recs = builder.build(&Track::new("x", "A")).await.unwrap();

        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.track.artist == "Fine" && r.match_score == 60));
    }

    #[tokio::test]
    async fn test_missing_match_counts_as_zero() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .returning(|request| match request.method.as_str() {
                "artist.getSimilar" => Ok(ApiPayload::Data(json!({
                    "similarartists": {"artist": {"name": "Solo"}}
                }))),
                _ => Ok(ApiPayload::Data(top_tracks("Solo", &["s1"]))),
            });

        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);
        let recs = builder.build(&Track::new("x", "A")).await.unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].match_score, 0);
    }

    #[tokio::test]
    async fn test_track_without_artist_makes_no_calls() {
        let mut api = MockCatalogApi::new();
        api.expect_call().times(0);

        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);
        let recs = builder.build(&Track::new("Untitled", "  ")).await.unwrap();

        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_no_similar_artists_is_empty() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .times(1)
            .returning(|_| Ok(ApiPayload::Data(similar(&[]))));

        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);
        assert!(builder.build(&Track::new("x", "A")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_similar_lookup_error_is_returned() {
        let mut api = MockCatalogApi::new();
        api.expect_call().times(1).returning(|_| {
            Ok(ApiPayload::Error(RemoteApiError {
                code: 29,
                message: "Rate limit exceeded".to_string(),
            }))
        });

        let config = BuilderConfig::default();
        let builder = RecommendationBuilder::new(&api, "key", &config);

        match builder.build(&Track::new("x", "A")).await {
            Err(LastFmError::Api(remote)) => assert_eq!(remote.code, 29),
            other => panic!("Expected Api error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inter_call_delay_between_candidates() {
        let mut api = MockCatalogApi::new();
        api.expect_call()
            .returning(|request| match request.method.as_str() {
                "artist.getSimilar" => Ok(ApiPayload::Data(similar(&[
                    ("B", "0.5"),
                    ("C", "0.5"),
                    ("D", "0.5"),
                ]))),
                _ => Ok(ApiPayload::Data(top_tracks("X", &["x"]))),
            });

        let config = BuilderConfig {
            inter_call_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let builder = RecommendationBuilder::new(&api, "key", &config);

        let started = Instant::now();
        let recs = builder.build(&Track::new("x", "A")).await.unwrap();

        assert_eq!(recs.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_seeded_build_is_permutation() {
        let config = BuilderConfig::default();
        let track = Track::new("a1", "A");

        let api = two_artist_api();
        let ordered = RecommendationBuilder::new(&api, "key", &config)
            .collect(&track)
            .await
            .unwrap();

        let api = two_artist_api();
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = RecommendationBuilder::new(&api, "key", &config)
            .build_with_rng(&track, &mut rng)
            .await
            .unwrap();

        let mut a: Vec<String> = ordered.iter().map(|r| r.track.name.clone()).collect();
        let mut b: Vec<String> = shuffled.iter().map(|r| r.track.name.clone()).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let original: Vec<u32> = (0..20).collect();

        let mut items = original.clone();
        shuffle(&mut items, &mut rng);

        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, original);
    }

    #[test]
    fn test_shuffle_moves_things_around() {
        let mut rng = StdRng::seed_from_u64(1);
        let original: Vec<u32> = (0..10).collect();

        let changed = (0..50).any(|_| {
            let mut items = original.clone();
            shuffle(&mut items, &mut rng);
            items != original
        });
        assert!(changed);
    }

    #[test]
    fn test_shuffle_short_inputs() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut empty: Vec<u32> = Vec::new();
        shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![9];
        shuffle(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }
}
