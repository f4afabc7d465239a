//! YouTube Data API v3 adapter.
//!
//! YouTube has no "followed live streams" endpoint usable with an API key, so
//! the client searches each configured channel for live and upcoming
//! broadcasts and enriches them with `liveStreamingDetails`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::try_join_all;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use url::Url;

use crate::request::HttpHelper;
use crate::{
    ClientOptions, FetchOptions, PlatformClient, PlatformError, PlatformType, Schedule, Stream,
};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS_PER_CHANNEL: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(&self) -> String {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .map(|t| t.url.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    live_streaming_details: Option<LiveDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveDetails {
    #[serde(default)]
    actual_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    scheduled_start_time: Option<DateTime<Utc>>,
    /// Sent as a decimal string.
    #[serde(default)]
    concurrent_viewers: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum EventType {
    Live,
    Upcoming,
}

impl EventType {
    fn as_str(self) -> &'static str {
        match self {
            EventType::Live => "live",
            EventType::Upcoming => "upcoming",
        }
    }
}

/// YouTube client driven by an API key and a list of channel ids.
pub struct YouTubeClient {
    http: HttpHelper,
    options: RwLock<ClientOptions>,
    base_url: String,
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            http: HttpHelper::new(),
            options: RwLock::new(ClientOptions::default()),
            base_url: API_BASE.to_string(),
        }
    }

    fn configured(&self) -> Result<(String, Vec<String>), PlatformError> {
        let opts = self
            .options
            .read()
            .map(|o| o.clone())
            .unwrap_or_default();
        let key = opts.api_key.ok_or(PlatformError::AuthRequired)?;
        Ok((key, opts.channel_ids))
    }

    async fn search(
        &self,
        key: &str,
        channel_id: &str,
        event_type: EventType,
    ) -> Result<Vec<SearchItem>, PlatformError> {
        let mut url = Url::parse(&format!("{}/search", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("part", "snippet")
            .append_pair("channelId", channel_id)
            .append_pair("eventType", event_type.as_str())
            .append_pair("type", "video")
            .append_pair("maxResults", &MAX_RESULTS_PER_CHANNEL.to_string())
            .append_pair("key", key);
        let resp: SearchResponse = self.http.get_json(url.as_str(), &HeaderMap::new()).await?;
        Ok(resp.items)
    }

    async fn search_all(
        &self,
        key: &str,
        channel_ids: &[String],
        event_type: EventType,
    ) -> Result<Vec<SearchItem>, PlatformError> {
        let results = try_join_all(
            channel_ids
                .iter()
                .map(|channel_id| self.search(key, channel_id, event_type)),
        )
        .await?;
        Ok(results.into_iter().flatten().collect())
    }

    async fn live_details(
        &self,
        key: &str,
        video_ids: &[String],
    ) -> Result<HashMap<String, LiveDetails>, PlatformError> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut details = HashMap::new();
        // The videos endpoint accepts at most 50 ids per call.
        for chunk in video_ids.chunks(50) {
            let mut url = Url::parse(&format!("{}/videos", self.base_url))?;
            url.query_pairs_mut()
                .append_pair("part", "liveStreamingDetails")
                .append_pair("id", &chunk.join(","))
                .append_pair("key", key);
            let resp: VideosResponse = self.http.get_json(url.as_str(), &HeaderMap::new()).await?;
            details.extend(
                resp.items
                    .into_iter()
                    .filter_map(|v| v.live_streaming_details.map(|d| (v.id, d))),
            );
        }
        Ok(details)
    }
}

fn video_ids(items: &[SearchItem]) -> Vec<String> {
    items.iter().filter_map(|i| i.id.video_id.clone()).collect()
}

fn stream_from_search(item: SearchItem, details: Option<&LiveDetails>) -> Option<Stream> {
    let video_id = item.id.video_id?;
    let viewers = details
        .and_then(|d| d.concurrent_viewers.as_deref())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    Some(Stream {
        thumbnail_url: item.snippet.thumbnails.best(),
        started_at: details.and_then(|d| d.actual_start_time),
        viewer_count: viewers,
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        ..Stream::new(
            PlatformType::YouTube,
            video_id,
            item.snippet.channel_title,
            item.snippet.title,
        )
    })
}

fn schedule_from_search(item: SearchItem, details: Option<&LiveDetails>) -> Option<Schedule> {
    let video_id = item.id.video_id?;
    Some(Schedule {
        thumbnail_url: item.snippet.thumbnails.best(),
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        ..Schedule::new(
            PlatformType::YouTube,
            video_id,
            item.snippet.channel_title,
            item.snippet.title,
            details.and_then(|d| d.scheduled_start_time),
        )
    })
}

#[async_trait]
impl PlatformClient for YouTubeClient {
    fn platform(&self) -> PlatformType {
        PlatformType::YouTube
    }

    async fn initialize(&self, options: ClientOptions) -> Result<(), PlatformError> {
        if let Ok(mut slot) = self.options.write() {
            *slot = options;
        }
        Ok(())
    }

    async fn get_streams(&self, options: &FetchOptions) -> Result<Vec<Stream>, PlatformError> {
        let (key, channels) = self.configured()?;
        let items = self.search_all(&key, &channels, EventType::Live).await?;
        let details = self.live_details(&key, &video_ids(&items)).await?;

        let mut streams: Vec<Stream> = items
            .into_iter()
            .filter_map(|item| {
                let d = item.id.video_id.clone().and_then(|id| details.get(&id));
                stream_from_search(item, d)
            })
            .collect();
        streams.truncate(options.max_results);
        tracing::debug!(count = streams.len(), channels = channels.len(), "Fetched YouTube live streams");
        Ok(streams)
    }

    fn supports_schedules(&self) -> bool {
        true
    }

    async fn get_schedules(&self, options: &FetchOptions) -> Result<Vec<Schedule>, PlatformError> {
        let (key, channels) = self.configured()?;
        let items = self.search_all(&key, &channels, EventType::Upcoming).await?;
        let details = self.live_details(&key, &video_ids(&items)).await?;
        let horizon = Utc::now() + ChronoDuration::hours(options.schedule_horizon_hours);

        let mut schedules: Vec<Schedule> = items
            .into_iter()
            .filter_map(|item| {
                let d = item.id.video_id.clone().and_then(|id| details.get(&id));
                schedule_from_search(item, d)
            })
            .filter(|s| s.scheduled_start_time.is_none_or(|t| t <= horizon))
            .collect();
        schedules.truncate(options.max_results);
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
      "items": [
        {
          "id": {"kind": "youtube#video", "videoId": "abc123"},
          "snippet": {
            "title": "Live coding",
            "channelTitle": "Rustacean",
            "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/abc123/hqdefault.jpg"}}
          }
        },
        {
          "id": {"kind": "youtube#channel"},
          "snippet": {"title": "channel result", "channelTitle": "Rustacean"}
        }
      ]
    }"#;

    const VIDEOS_BODY: &str = r#"{
      "items": [{
        "id": "abc123",
        "liveStreamingDetails": {
          "actualStartTime": "2026-02-01T10:00:00Z",
          "scheduledStartTime": "2026-02-01T09:55:00Z",
          "concurrentViewers": "1234"
        }
      }]
    }"#;

    #[test]
    fn search_items_map_to_streams_with_viewers() {
        let search: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let videos: VideosResponse = serde_json::from_str(VIDEOS_BODY).unwrap();
        let details = videos.items[0].live_streaming_details.clone();

        assert_eq!(video_ids(&search.items), vec!["abc123".to_string()]);

        let stream = stream_from_search(search.items[0].clone(), details.as_ref()).unwrap();
        assert_eq!(stream.id, "abc123");
        assert_eq!(stream.streamer_name, "Rustacean");
        assert_eq!(stream.viewer_count, 1234);
        assert_eq!(stream.url, "https://www.youtube.com/watch?v=abc123");
        assert!(stream.thumbnail_url.contains("hqdefault"));
        assert!(stream.started_at.is_some());

        // Non-video search results are dropped.
        assert!(stream_from_search(search.items[1].clone(), None).is_none());
    }

    #[test]
    fn upcoming_item_keeps_scheduled_start() {
        let search: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let videos: VideosResponse = serde_json::from_str(VIDEOS_BODY).unwrap();
        let details = videos.items[0].live_streaming_details.clone();

        let schedule = schedule_from_search(search.items[0].clone(), details.as_ref()).unwrap();
        assert_eq!(
            schedule.scheduled_start_time.map(|t| t.to_rfc3339()),
            Some("2026-02-01T09:55:00+00:00".to_string())
        );
    }

    #[test]
    fn missing_viewer_count_defaults_to_zero() {
        let search: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let stream = stream_from_search(search.items[0].clone(), None).unwrap();
        assert_eq!(stream.viewer_count, 0);
        assert!(stream.started_at.is_none());
    }

    #[tokio::test]
    async fn streams_require_api_key() {
        let client = YouTubeClient::new();
        let err = client
            .get_streams(&FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::AuthRequired));
    }

    #[tokio::test]
    async fn no_channels_means_no_streams() {
        let client = YouTubeClient::new();
        client
            .initialize(ClientOptions {
                api_key: Some("key".into()),
                ..ClientOptions::default()
            })
            .await
            .unwrap();
        let streams = client.get_streams(&FetchOptions::default()).await.unwrap();
        assert!(streams.is_empty());
    }
}
