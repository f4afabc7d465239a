use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported streaming platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Twitch,
    YouTube,
    TwitCasting,
}

impl PlatformType {
    pub const ALL: [PlatformType; 3] = [
        PlatformType::Twitch,
        PlatformType::YouTube,
        PlatformType::TwitCasting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Twitch => "twitch",
            PlatformType::YouTube => "youtube",
            PlatformType::TwitCasting => "twitcasting",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "twitch" => Ok(PlatformType::Twitch),
            "youtube" => Ok(PlatformType::YouTube),
            "twitcasting" => Ok(PlatformType::TwitCasting),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// `(platform_type, id)` pair identifying a stream or schedule across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub platform_type: PlatformType,
    pub id: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.platform_type, self.id)
    }
}

/// One live broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub id: String,
    pub platform_type: PlatformType,
    pub title: String,
    pub streamer_name: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub notified: bool,
}

impl Stream {
    pub fn new(
        platform_type: PlatformType,
        id: impl Into<String>,
        streamer_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform_type,
            title: title.into(),
            streamer_name: streamer_name.into(),
            thumbnail_url: String::new(),
            started_at: None,
            viewer_count: 0,
            url: String::new(),
            is_favorite: false,
            notified: false,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            platform_type: self.platform_type,
            id: self.id.clone(),
        }
    }
}

/// One future broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub platform_type: PlatformType,
    pub title: String,
    pub streamer_name: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub scheduled_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub notified: bool,
}

impl Schedule {
    pub fn new(
        platform_type: PlatformType,
        id: impl Into<String>,
        streamer_name: impl Into<String>,
        title: impl Into<String>,
        scheduled_start_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            platform_type,
            title: title.into(),
            streamer_name: streamer_name.into(),
            thumbnail_url: String::new(),
            scheduled_start_time,
            url: String::new(),
            is_favorite: false,
            notified: false,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            platform_type: self.platform_type,
            id: self.id.clone(),
        }
    }
}

/// Credentials and channel configuration handed to a client.
///
/// Each adapter reads only the fields it needs; the caller is responsible
/// for persisting them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Channels/users to watch on platforms without a "followed" endpoint.
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

/// Per-request fetch tuning.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_results: usize,
    /// How far ahead schedules are collected.
    pub schedule_horizon_hours: i64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_results: 100,
            schedule_horizon_hours: 24 * 7,
        }
    }
}

/// Outcome of [`crate::PlatformClient::authenticate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub platform_type: PlatformType,
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
