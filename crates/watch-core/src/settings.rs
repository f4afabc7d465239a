//! Watch settings: loaded once from the store, changed only through
//! [`SettingsPatch`], and always re-saved in full.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use platform_client::PlatformType;
use serde::{Deserialize, Serialize};

use crate::store::{self, Store, StoreError, keys};

pub const MIN_UPDATE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REMINDER_MINUTES: i64 = 10;
const MAX_REMINDER_MINUTES: i64 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Poll interval in seconds.
    pub update_interval: u64,
    pub enable_notifications: bool,
    pub notify_only_favorites: bool,
    pub reminders: bool,
    /// Minutes before a scheduled start at which a reminder fires.
    pub reminder_time: i64,
    pub enabled_platforms: BTreeMap<PlatformType, bool>,
    pub favorite_streamers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL_SECS,
            enable_notifications: true,
            notify_only_favorites: false,
            reminders: true,
            reminder_time: DEFAULT_REMINDER_MINUTES,
            enabled_platforms: PlatformType::ALL.iter().map(|p| (*p, true)).collect(),
            favorite_streamers: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from the store, falling back to defaults when nothing was saved yet.
    pub async fn load(store: &dyn Store) -> Result<Self, SettingsError> {
        let settings: Option<Settings> = store::load(store, keys::SETTINGS).await?;
        Ok(settings.unwrap_or_default().normalized())
    }

    pub async fn save(&self, store: &dyn Store) -> Result<(), SettingsError> {
        store::save(store, keys::SETTINGS, self).await?;
        Ok(())
    }

    /// Enforce the minimum poll interval and a reminder window of 1..=1440 minutes.
    pub fn normalized(mut self) -> Self {
        self.update_interval = self.update_interval.max(MIN_UPDATE_INTERVAL_SECS);
        self.reminder_time = self.reminder_time.clamp(1, MAX_REMINDER_MINUTES);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.max(MIN_UPDATE_INTERVAL_SECS))
    }

    pub fn is_platform_enabled(&self, platform: PlatformType) -> bool {
        self.enabled_platforms.get(&platform).copied().unwrap_or(false)
    }

    /// Enabled platforms in stable declaration order.
    pub fn enabled_platform_list(&self) -> Vec<PlatformType> {
        PlatformType::ALL
            .into_iter()
            .filter(|p| self.is_platform_enabled(*p))
            .collect()
    }

    pub fn is_favorite_streamer(&self, streamer_name: &str) -> bool {
        self.favorite_streamers
            .iter()
            .any(|f| f.eq_ignore_ascii_case(streamer_name))
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub update_interval: Option<u64>,
    pub enable_notifications: Option<bool>,
    pub notify_only_favorites: Option<bool>,
    pub reminders: Option<bool>,
    pub reminder_time: Option<i64>,
    pub enabled_platforms: Option<BTreeMap<PlatformType, bool>>,
    pub favorite_streamers: Option<Vec<String>>,
}

impl SettingsPatch {
    /// Apply to a copy of `current`, validating each provided field.
    pub fn apply(&self, current: &Settings) -> Result<Settings, SettingsError> {
        let mut next = current.clone();

        if let Some(interval) = self.update_interval {
            if interval == 0 {
                return Err(SettingsError::Invalid {
                    field: "updateInterval",
                    reason: "must be positive".into(),
                });
            }
            next.update_interval = interval;
        }
        if let Some(minutes) = self.reminder_time {
            if !(1..=MAX_REMINDER_MINUTES).contains(&minutes) {
                return Err(SettingsError::Invalid {
                    field: "reminderTime",
                    reason: format!("must be between 1 and {MAX_REMINDER_MINUTES} minutes"),
                });
            }
            next.reminder_time = minutes;
        }
        if let Some(v) = self.enable_notifications {
            next.enable_notifications = v;
        }
        if let Some(v) = self.notify_only_favorites {
            next.notify_only_favorites = v;
        }
        if let Some(v) = self.reminders {
            next.reminders = v;
        }
        if let Some(platforms) = &self.enabled_platforms {
            next.enabled_platforms.extend(platforms.iter().map(|(k, v)| (*k, *v)));
        }
        if let Some(favorites) = &self.favorite_streamers {
            next.favorite_streamers = favorites
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
        }

        Ok(next.normalized())
    }
}

/// Shared, cheaply cloneable view of the current settings.
#[derive(Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn get(&self) -> Settings {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn replace(&self, settings: Settings) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = settings;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn interval_is_clamped_to_one_minute() {
        let patch = SettingsPatch {
            update_interval: Some(10),
            ..SettingsPatch::default()
        };
        let next = patch.apply(&Settings::default()).unwrap();
        assert_eq!(next.update_interval, MIN_UPDATE_INTERVAL_SECS);
        assert_eq!(next.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn reminder_time_out_of_range_is_rejected() {
        let patch = SettingsPatch {
            reminder_time: Some(0),
            ..SettingsPatch::default()
        };
        assert!(matches!(
            patch.apply(&Settings::default()),
            Err(SettingsError::Invalid {
                field: "reminderTime",
                ..
            })
        ));
    }

    #[test]
    fn platform_patch_merges_into_existing_map() {
        let mut platforms = BTreeMap::new();
        platforms.insert(PlatformType::YouTube, false);
        let patch = SettingsPatch {
            enabled_platforms: Some(platforms),
            ..SettingsPatch::default()
        };
        let next = patch.apply(&Settings::default()).unwrap();
        assert_eq!(
            next.enabled_platform_list(),
            vec![PlatformType::Twitch, PlatformType::TwitCasting]
        );
    }

    #[test]
    fn favorites_match_case_insensitively() {
        let patch = SettingsPatch {
            favorite_streamers: Some(vec![" Alice ".into(), "".into()]),
            ..SettingsPatch::default()
        };
        let next = patch.apply(&Settings::default()).unwrap();
        assert_eq!(next.favorite_streamers, vec!["Alice".to_string()]);
        assert!(next.is_favorite_streamer("alice"));
        assert!(!next.is_favorite_streamer("bob"));
    }

    #[test]
    fn settings_json_uses_camel_case_and_platform_keys() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["updateInterval"], 300);
        assert_eq!(value["enabledPlatforms"]["twitcasting"], true);
        assert_eq!(value["reminderTime"], 10);
    }

    #[tokio::test]
    async fn load_defaults_then_round_trip() {
        let store = MemoryStore::new();
        let loaded = Settings::load(&store).await.unwrap();
        assert_eq!(loaded, Settings::default());

        let changed = Settings {
            update_interval: 120,
            reminders: false,
            ..Settings::default()
        };
        changed.save(&store).await.unwrap();
        assert_eq!(Settings::load(&store).await.unwrap(), changed);
    }

    #[tokio::test]
    async fn stored_partial_settings_fill_defaults() {
        let store = MemoryStore::new();
        store
            .set(keys::SETTINGS, serde_json::json!({"updateInterval": 5}))
            .await
            .unwrap();
        let loaded = Settings::load(&store).await.unwrap();
        assert_eq!(loaded.update_interval, MIN_UPDATE_INTERVAL_SECS);
        assert!(loaded.enable_notifications);
    }

    #[tokio::test]
    async fn stored_reminder_time_is_clamped_to_accepted_range() {
        let store = MemoryStore::new();
        store
            .set(keys::SETTINGS, serde_json::json!({"reminderTime": 0}))
            .await
            .unwrap();
        assert_eq!(Settings::load(&store).await.unwrap().reminder_time, 1);

        store
            .set(keys::SETTINGS, serde_json::json!({"reminderTime": 5000}))
            .await
            .unwrap();
        assert_eq!(
            Settings::load(&store).await.unwrap().reminder_time,
            MAX_REMINDER_MINUTES
        );
    }
}
