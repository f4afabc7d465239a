//! Runtime application configuration loaded from DB + environment overrides.

use platform_client::{ClientOptions, PlatformType};

use super::manager::SettingsManager;
use super::validation::split_list;

const DEFAULT_SERVER_PORT: u16 = 8080;

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub twitch_client_id: String,
    pub twitch_access_token: String,
    pub twitch_user_id: String,
    pub youtube_api_key: String,
    pub youtube_channel_ids: Vec<String>,
    pub twitcasting_access_token: String,
    pub twitcasting_user_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            twitch_client_id: String::new(),
            twitch_access_token: String::new(),
            twitch_user_id: String::new(),
            youtube_api_key: String::new(),
            youtube_channel_ids: Vec::new(),
            twitcasting_access_token: String::new(),
            twitcasting_user_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let mut config = Self::from_lookup(|key| sm.get_setting(key).unwrap_or_default());

        // Environment variable override (container deployments)
        if let Ok(v) = std::env::var("SERVER_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                config.server_port = p;
            }
        }

        Ok(config)
    }

    fn from_lookup(g: impl Fn(&str) -> String) -> Self {
        Self {
            server_port: parse_u16(&g("SERVER_PORT"), DEFAULT_SERVER_PORT),
            twitch_client_id: g("TWITCH_CLIENT_ID"),
            twitch_access_token: g("TWITCH_ACCESS_TOKEN"),
            twitch_user_id: g("TWITCH_USER_ID"),
            youtube_api_key: g("YOUTUBE_API_KEY"),
            youtube_channel_ids: split_list(&g("YOUTUBE_CHANNEL_IDS")),
            twitcasting_access_token: g("TWITCASTING_ACCESS_TOKEN"),
            twitcasting_user_ids: split_list(&g("TWITCASTING_USER_IDS")),
        }
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }

    /// Credentials and channel lists for one platform adapter.
    pub fn client_options(&self, platform: PlatformType) -> ClientOptions {
        match platform {
            PlatformType::Twitch => ClientOptions {
                client_id: non_empty(&self.twitch_client_id),
                access_token: non_empty(&self.twitch_access_token),
                user_id: non_empty(&self.twitch_user_id),
                ..ClientOptions::default()
            },
            PlatformType::YouTube => ClientOptions {
                api_key: non_empty(&self.youtube_api_key),
                channel_ids: self.youtube_channel_ids.clone(),
                ..ClientOptions::default()
            },
            PlatformType::TwitCasting => ClientOptions {
                access_token: non_empty(&self.twitcasting_access_token),
                channel_ids: self.twitcasting_user_ids.clone(),
                ..ClientOptions::default()
            },
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn parse_u16(s: &str, default: u16) -> u16 {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}
