//! SettingsManager: DB-backed settings with defaults, migration, and feature status.

use std::collections::HashMap;

use platform_client::PlatformType;
use watch_db::Database;

use super::defaults::DEFAULT_SETTINGS;
use super::validation::validate_setting;
use super::{FeatureStatus, SettingInfo, SettingType};

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        anyhow::bail!("setting not found: {key}");
    }

    /// Set a setting value with validation.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;

        validate_setting(key, value).map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;

        self.db.set_setting(key, value, type_str(def.secret))?;
        Ok(())
    }

    /// Get all settings, filling in defaults for missing keys. Secret values
    /// are masked.
    pub fn get_all_settings(&self) -> Result<HashMap<String, SettingInfo>, anyhow::Error> {
        let db_settings = self.db.get_all_settings()?;

        let result = DEFAULT_SETTINGS
            .iter()
            .map(|(key, def)| {
                let value = db_settings
                    .get(*key)
                    .cloned()
                    .unwrap_or_else(|| def.default.to_string());
                let has_value = !value.is_empty();
                let (setting_type, value) = if def.secret {
                    (SettingType::Secret, mask(&value))
                } else {
                    (SettingType::Normal, value)
                };
                (
                    key.to_string(),
                    SettingInfo {
                        key: key.to_string(),
                        value,
                        setting_type,
                        required: def.required,
                        description: def.description.to_string(),
                        has_value,
                    },
                )
            })
            .collect();

        Ok(result)
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), anyhow::Error> {
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            self.db.set_setting(key, def.default, type_str(def.secret))?;
        }
        Ok(())
    }

    /// Migrate settings from environment variables to DB (one-time).
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            if let Err(e) = validate_setting(key, &env_val) {
                tracing::warn!("Skipping invalid env setting {key}: {e}");
                continue;
            }
            self.db.set_setting(key, &env_val, type_str(def.secret))?;
            tracing::info!("Migrated setting from env: {key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
            if has_secret_in_env() {
                tracing::warn!(
                    "SECURITY WARNING: Sensitive data in env vars. \
                     Remove from .env after confirming migration."
                );
            }
        }
        Ok(migrated)
    }

    /// Check which platforms have enough credentials to be polled.
    pub fn check_feature_status(&self) -> Result<FeatureStatus, anyhow::Error> {
        let mut status = FeatureStatus {
            twitch_configured: false,
            youtube_configured: false,
            twitcasting_configured: false,
            missing_settings: Vec::new(),
            warnings: Vec::new(),
        };

        status.twitch_configured = self.check_keys(
            PlatformType::Twitch,
            &["TWITCH_CLIENT_ID", "TWITCH_ACCESS_TOKEN"],
            &mut status.missing_settings,
        )?;
        status.youtube_configured = self.check_keys(
            PlatformType::YouTube,
            &["YOUTUBE_API_KEY", "YOUTUBE_CHANNEL_IDS"],
            &mut status.missing_settings,
        )?;
        status.twitcasting_configured = self.check_keys(
            PlatformType::TwitCasting,
            &["TWITCASTING_ACCESS_TOKEN", "TWITCASTING_USER_IDS"],
            &mut status.missing_settings,
        )?;

        if !status.twitch_configured && !status.youtube_configured && !status.twitcasting_configured {
            status
                .warnings
                .push("No platform is configured - polling will find no streams".into());
        }

        Ok(status)
    }

    /// A token stored through the auth endpoint stands in for the
    /// platform's `*_ACCESS_TOKEN` setting.
    fn check_keys(
        &self,
        platform: PlatformType,
        keys: &[&str],
        missing: &mut Vec<String>,
    ) -> Result<bool, anyhow::Error> {
        let has_token = self.db.get_latest_token(platform.as_str())?.is_some();
        let mut configured = true;
        for key in keys {
            if has_token && key.ends_with("_ACCESS_TOKEN") {
                continue;
            }
            if self.get_setting(key)?.is_empty() {
                missing.push(key.to_string());
                configured = false;
            }
        }
        Ok(configured)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

fn type_str(secret: bool) -> &'static str {
    if secret { "secret" } else { "normal" }
}

fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

fn has_secret_in_env() -> bool {
    DEFAULT_SETTINGS
        .values()
        .filter(|def| def.secret)
        .any(|def| std::env::var(def.key).is_ok_and(|v| !v.is_empty()))
}
