//! TwitCasting API v2 adapter.
//!
//! TwitCasting exposes no schedule data, so only live streams and credential
//! verification are implemented.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::request::{HttpHelper, auth_headers};
use crate::{
    AuthResult, ClientOptions, FetchOptions, PlatformClient, PlatformError, PlatformType, Stream,
};

const API_BASE: &str = "https://apiv2.twitcasting.tv";

/// Body of GET /users/:user_id/current_live.
#[derive(Debug, Deserialize)]
struct CurrentLive {
    movie: Movie,
    broadcaster: Broadcaster,
}

#[derive(Debug, Deserialize)]
struct Movie {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    is_live: bool,
    #[serde(default)]
    current_view_count: u64,
    /// Unix seconds.
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    large_thumbnail: String,
}

#[derive(Debug, Deserialize)]
struct Broadcaster {
    #[serde(default)]
    screen_id: String,
    name: String,
}

/// Body of GET /verify_credentials.
#[derive(Debug, Deserialize)]
struct VerifyCredentials {
    user: VerifiedUser,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    id: String,
    #[serde(default)]
    screen_id: String,
}

/// TwitCasting client watching a configured list of users.
pub struct TwitCastingClient {
    http: HttpHelper,
    options: RwLock<ClientOptions>,
    base_url: String,
}

impl Default for TwitCastingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitCastingClient {
    pub fn new() -> Self {
        Self {
            http: HttpHelper::new(),
            options: RwLock::new(ClientOptions::default()),
            base_url: API_BASE.to_string(),
        }
    }

    fn headers(token: &str) -> Result<HeaderMap, PlatformError> {
        let mut headers = auth_headers("Bearer", token)?;
        headers.insert("X-Api-Version", HeaderValue::from_static("2.0"));
        Ok(headers)
    }
}

fn stream_from_live(live: CurrentLive) -> Option<Stream> {
    if !live.movie.is_live {
        return None;
    }
    let url = if live.movie.link.is_empty() {
        format!("https://twitcasting.tv/{}", live.broadcaster.screen_id)
    } else {
        live.movie.link
    };
    let title = if live.movie.title.is_empty() {
        format!("{} is live", live.broadcaster.name)
    } else {
        live.movie.title
    };
    Some(Stream {
        thumbnail_url: live.movie.large_thumbnail,
        started_at: live
            .movie
            .created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        viewer_count: live.movie.current_view_count,
        url,
        ..Stream::new(
            PlatformType::TwitCasting,
            live.movie.id,
            live.broadcaster.name,
            title,
        )
    })
}

#[async_trait]
impl PlatformClient for TwitCastingClient {
    fn platform(&self) -> PlatformType {
        PlatformType::TwitCasting
    }

    async fn initialize(&self, options: ClientOptions) -> Result<(), PlatformError> {
        if let Ok(mut slot) = self.options.write() {
            *slot = options;
        }
        Ok(())
    }

    async fn get_streams(&self, options: &FetchOptions) -> Result<Vec<Stream>, PlatformError> {
        let opts = self
            .options
            .read()
            .map(|o| o.clone())
            .unwrap_or_default();
        let token = opts.access_token.ok_or(PlatformError::AuthRequired)?;
        let headers = Self::headers(&token)?;

        let lives = try_join_all(opts.channel_ids.iter().map(|user_id| {
            let url = format!("{}/users/{user_id}/current_live", self.base_url);
            let headers = headers.clone();
            async move {
                // 404 means the user is offline
                self.http
                    .get_optional_json::<CurrentLive>(&url, &headers)
                    .await
            }
        }))
        .await?;

        let mut streams: Vec<Stream> = lives
            .into_iter()
            .flatten()
            .filter_map(stream_from_live)
            .collect();
        streams.truncate(options.max_results);
        Ok(streams)
    }

    async fn authenticate(&self, options: &ClientOptions) -> Result<AuthResult, PlatformError> {
        let token = options
            .access_token
            .as_deref()
            .ok_or(PlatformError::AuthRequired)?;
        let url = format!("{}/verify_credentials", self.base_url);
        let verified: VerifyCredentials = self.http.get_json(&url, &Self::headers(token)?).await?;

        let mut adopted = options.clone();
        if adopted.user_id.is_none() {
            adopted.user_id = Some(verified.user.id.clone());
        }
        self.initialize(adopted).await?;

        Ok(AuthResult {
            platform_type: PlatformType::TwitCasting,
            authenticated: true,
            user_id: Some(verified.user.id),
            user_name: Some(verified.user.screen_id),
            expires_in: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_live_maps_to_stream() {
        let body = r#"{
          "movie": {
            "id": "189037369",
            "user_id": "182224938",
            "title": "ライブ #189037369",
            "link": "https://twitcasting.tv/twitcasting_jp/movie/189037369",
            "is_live": true,
            "current_view_count": 20,
            "created": 1438500282,
            "large_thumbnail": "https://apiv2-doc.twitcasting.tv/thumb.jpg"
          },
          "broadcaster": {
            "id": "182224938",
            "screen_id": "twitcasting_jp",
            "name": "ツイキャス公式"
          }
        }"#;

        let live: CurrentLive = serde_json::from_str(body).unwrap();
        let stream = stream_from_live(live).unwrap();
        assert_eq!(stream.id, "189037369");
        assert_eq!(stream.platform_type, PlatformType::TwitCasting);
        assert_eq!(stream.streamer_name, "ツイキャス公式");
        assert_eq!(stream.viewer_count, 20);
        assert_eq!(
            stream.url,
            "https://twitcasting.tv/twitcasting_jp/movie/189037369"
        );
        assert_eq!(stream.started_at.map(|t| t.timestamp()), Some(1438500282));
    }

    #[test]
    fn ended_movie_is_not_a_stream() {
        let body = r#"{
          "movie": {"id": "1", "is_live": false},
          "broadcaster": {"screen_id": "someone", "name": "Someone"}
        }"#;
        let live: CurrentLive = serde_json::from_str(body).unwrap();
        assert!(stream_from_live(live).is_none());
    }

    #[test]
    fn empty_link_falls_back_to_profile_url() {
        let body = r#"{
          "movie": {"id": "2", "is_live": true},
          "broadcaster": {"screen_id": "someone", "name": "Someone"}
        }"#;
        let stream = stream_from_live(serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(stream.url, "https://twitcasting.tv/someone");
        assert_eq!(stream.title, "Someone is live");
    }

    #[tokio::test]
    async fn schedules_are_unsupported() {
        let client = TwitCastingClient::new();
        let err = client
            .get_schedules(&FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(_)));
    }
}
