//! Twitch Helix adapter: followed live streams, channel schedules and token validation.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use reqwest::header::HeaderValue;
use serde::Deserialize;

use crate::request::{HttpHelper, auth_headers};
use crate::{
    AuthResult, ClientOptions, FetchOptions, PlatformClient, PlatformError, PlatformType, Schedule,
    Stream,
};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";
const SCHEDULE_SEGMENTS_PER_CHANNEL: usize = 5;
const MAX_SCHEDULE_CHANNELS: usize = 25;

#[derive(Debug, Deserialize)]
struct HelixResponse<T> {
    data: Vec<T>,
}

/// Entry from GET /helix/streams/followed.
#[derive(Debug, Clone, Deserialize)]
struct FollowedStream {
    id: String,
    user_login: String,
    user_name: String,
    title: String,
    viewer_count: u64,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    thumbnail_url: String,
}

/// Entry from GET /helix/channels/followed.
#[derive(Debug, Clone, Deserialize)]
struct FollowedChannel {
    broadcaster_id: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    data: ChannelSchedule,
}

/// Body of GET /helix/schedule.
#[derive(Debug, Deserialize)]
struct ChannelSchedule {
    #[serde(default)]
    segments: Option<Vec<ScheduleSegment>>,
    broadcaster_name: String,
    broadcaster_login: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleSegment {
    id: String,
    start_time: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    canceled_until: Option<String>,
}

/// Body of GET https://id.twitch.tv/oauth2/validate.
#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Twitch client authenticated with a user access token.
pub struct TwitchClient {
    http: HttpHelper,
    options: RwLock<ClientOptions>,
    base_url: String,
}

impl Default for TwitchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitchClient {
    pub fn new() -> Self {
        Self {
            http: HttpHelper::new(),
            options: RwLock::new(ClientOptions::default()),
            base_url: HELIX_BASE.to_string(),
        }
    }

    fn snapshot_options(&self) -> ClientOptions {
        self.options
            .read()
            .map(|o| o.clone())
            .unwrap_or_default()
    }

    /// Resolve client id, token and user id, or explain what is missing.
    fn credentials(&self) -> Result<(String, String, String), PlatformError> {
        let opts = self.snapshot_options();
        let token = opts.access_token.ok_or(PlatformError::AuthRequired)?;
        let client_id = opts
            .client_id
            .ok_or_else(|| PlatformError::NotConfigured("twitch client id".into()))?;
        let user_id = opts
            .user_id
            .ok_or_else(|| PlatformError::NotConfigured("twitch user id".into()))?;
        Ok((client_id, token, user_id))
    }

    fn helix_headers(
        client_id: &str,
        token: &str,
    ) -> Result<reqwest::header::HeaderMap, PlatformError> {
        let mut headers = auth_headers("Bearer", token)?;
        headers.insert("Client-Id", HeaderValue::from_str(client_id)?);
        Ok(headers)
    }
}

#[async_trait]
impl PlatformClient for TwitchClient {
    fn platform(&self) -> PlatformType {
        PlatformType::Twitch
    }

    async fn initialize(&self, options: ClientOptions) -> Result<(), PlatformError> {
        if let Ok(mut slot) = self.options.write() {
            *slot = options;
        }
        Ok(())
    }

    async fn get_streams(&self, options: &FetchOptions) -> Result<Vec<Stream>, PlatformError> {
        let (client_id, token, user_id) = self.credentials()?;
        let headers = Self::helix_headers(&client_id, &token)?;
        let first = options.max_results.clamp(1, 100);
        let url = format!(
            "{}/streams/followed?user_id={user_id}&first={first}",
            self.base_url
        );
        let resp: HelixResponse<FollowedStream> = self.http.get_json(&url, &headers).await?;
        tracing::debug!(count = resp.data.len(), "Fetched Twitch followed streams");
        Ok(resp.data.into_iter().map(stream_from_followed).collect())
    }

    fn supports_schedules(&self) -> bool {
        true
    }

    async fn get_schedules(&self, options: &FetchOptions) -> Result<Vec<Schedule>, PlatformError> {
        let (client_id, token, user_id) = self.credentials()?;
        let headers = Self::helix_headers(&client_id, &token)?;

        let url = format!(
            "{}/channels/followed?user_id={user_id}&first=100",
            self.base_url
        );
        let channels: HelixResponse<FollowedChannel> = self.http.get_json(&url, &headers).await?;

        let requests = channels
            .data
            .iter()
            .take(MAX_SCHEDULE_CHANNELS)
            .map(|channel| {
                let url = format!(
                    "{}/schedule?broadcaster_id={}&first={SCHEDULE_SEGMENTS_PER_CHANNEL}",
                    self.base_url, channel.broadcaster_id
                );
                let headers = headers.clone();
                async move {
                    self.http
                        .get_optional_json::<ScheduleResponse>(&url, &headers)
                        .await
                }
            });

        let horizon = Utc::now() + ChronoDuration::hours(options.schedule_horizon_hours);
        let mut schedules = Vec::new();
        for result in join_all(requests).await {
            // 404 means the channel has no schedule configured
            if let Some(resp) = result? {
                schedules.extend(schedules_from_channel(resp.data, horizon));
            }
        }
        schedules.truncate(options.max_results);
        Ok(schedules)
    }

    async fn authenticate(&self, options: &ClientOptions) -> Result<AuthResult, PlatformError> {
        let token = options
            .access_token
            .as_deref()
            .ok_or(PlatformError::AuthRequired)?;
        let headers = auth_headers("OAuth", token)?;
        let validated: ValidateResponse = self.http.get_json(VALIDATE_URL, &headers).await?;

        let mut adopted = options.clone();
        if adopted.user_id.is_none() {
            adopted.user_id = validated.user_id.clone();
        }
        self.initialize(adopted).await?;

        tracing::info!(login = ?validated.login, "Twitch token validated");
        Ok(AuthResult {
            platform_type: PlatformType::Twitch,
            authenticated: true,
            user_id: validated.user_id,
            user_name: validated.login,
            expires_in: validated.expires_in,
        })
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn stream_from_followed(info: FollowedStream) -> Stream {
    Stream {
        thumbnail_url: info
            .thumbnail_url
            .replace("{width}", "440")
            .replace("{height}", "248"),
        started_at: info.started_at.as_deref().and_then(parse_time),
        viewer_count: info.viewer_count,
        url: format!("https://www.twitch.tv/{}", info.user_login),
        ..Stream::new(PlatformType::Twitch, info.id, info.user_name, info.title)
    }
}

fn schedules_from_channel(channel: ChannelSchedule, horizon: DateTime<Utc>) -> Vec<Schedule> {
    let url = format!("https://www.twitch.tv/{}/schedule", channel.broadcaster_login);
    channel
        .segments
        .unwrap_or_default()
        .into_iter()
        .filter(|segment| segment.canceled_until.is_none())
        .filter_map(|segment| {
            let start = parse_time(&segment.start_time)?;
            if start > horizon {
                return None;
            }
            Some(Schedule {
                url: url.clone(),
                ..Schedule::new(
                    PlatformType::Twitch,
                    segment.id,
                    channel.broadcaster_name.clone(),
                    segment.title,
                    Some(start),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn followed_stream_maps_to_stream() {
        let body = r#"{
          "data": [{
            "id": "41375541868",
            "user_id": "459331509",
            "user_login": "auronplay",
            "user_name": "auronplay",
            "game_id": "494131",
            "game_name": "Little Nightmares",
            "type": "live",
            "title": "hablamos y le damos a Little Nightmares 1",
            "viewer_count": 78365,
            "started_at": "2021-03-10T15:04:21Z",
            "thumbnail_url": "https://static-cdn.jtvnw.net/previews-ttv/live_user_auronplay-{width}x{height}.jpg"
          }]
        }"#;

        let parsed: HelixResponse<FollowedStream> = serde_json::from_str(body).unwrap();
        let stream = stream_from_followed(parsed.data[0].clone());
        assert_eq!(stream.id, "41375541868");
        assert_eq!(stream.platform_type, PlatformType::Twitch);
        assert_eq!(stream.viewer_count, 78365);
        assert_eq!(stream.url, "https://www.twitch.tv/auronplay");
        assert!(stream.thumbnail_url.ends_with("auronplay-440x248.jpg"));
        assert_eq!(
            stream.started_at.map(|t| t.to_rfc3339()),
            Some("2021-03-10T15:04:21+00:00".to_string())
        );
        assert!(!stream.notified);
    }

    #[test]
    fn schedule_segments_skip_canceled_and_far_future() {
        let body = r#"{
          "data": {
            "segments": [
              {"id": "seg1", "start_time": "2026-01-01T10:00:00Z", "title": "morning"},
              {"id": "seg2", "start_time": "2026-01-01T12:00:00Z", "title": "noon",
               "canceled_until": "2026-01-01T13:00:00Z"},
              {"id": "seg3", "start_time": "2026-03-01T10:00:00Z", "title": "later"}
            ],
            "broadcaster_id": "141981764",
            "broadcaster_name": "TwitchDev",
            "broadcaster_login": "twitchdev"
          }
        }"#;

        let parsed: ScheduleResponse = serde_json::from_str(body).unwrap();
        let horizon = parse_time("2026-01-08T00:00:00Z").unwrap();
        let schedules = schedules_from_channel(parsed.data, horizon);

        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].id, "seg1");
        assert_eq!(schedules[0].streamer_name, "TwitchDev");
        assert_eq!(schedules[0].url, "https://www.twitch.tv/twitchdev/schedule");
        assert!(schedules[0].scheduled_start_time.is_some());
    }

    #[test]
    fn schedule_without_segments_is_empty() {
        let body = r#"{"data": {"segments": null, "broadcaster_name": "a", "broadcaster_login": "a"}}"#;
        let parsed: ScheduleResponse = serde_json::from_str(body).unwrap();
        assert!(schedules_from_channel(parsed.data, Utc::now()).is_empty());
    }

    #[tokio::test]
    async fn streams_require_token() {
        let client = TwitchClient::new();
        let err = client
            .get_streams(&FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn streams_require_user_id() {
        let client = TwitchClient::new();
        client
            .initialize(ClientOptions {
                client_id: Some("cid".into()),
                access_token: Some("token".into()),
                ..ClientOptions::default()
            })
            .await
            .unwrap();
        let err = client
            .get_streams(&FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotConfigured(_)));
    }
}
