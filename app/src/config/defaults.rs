//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("SERVER_PORT", "8080", false, false, "HTTP/WebSocket listen port"),
    ("TWITCH_CLIENT_ID", "", false, false, "Twitch application client id"),
    ("TWITCH_ACCESS_TOKEN", "", true, false, "Twitch user access token"),
    ("TWITCH_USER_ID", "", false, false, "Twitch user whose followed channels are watched"),
    ("YOUTUBE_API_KEY", "", true, false, "YouTube Data API key"),
    ("YOUTUBE_CHANNEL_IDS", "", false, false, "Comma-separated YouTube channel ids"),
    ("TWITCASTING_ACCESS_TOKEN", "", true, false, "TwitCasting access token"),
    ("TWITCASTING_USER_IDS", "", false, false, "Comma-separated TwitCasting user ids"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_are_indexed_by_key() {
        assert_eq!(DEFAULT_SETTINGS.len(), DEFS.len());
        for (key, def) in DEFAULT_SETTINGS.iter() {
            assert_eq!(*key, def.key);
        }
    }

    #[test]
    fn tokens_and_keys_are_secret() {
        for key in ["TWITCH_ACCESS_TOKEN", "YOUTUBE_API_KEY", "TWITCASTING_ACCESS_TOKEN"] {
            assert!(DEFAULT_SETTINGS[key].secret, "{key} should be secret");
        }
        assert!(!DEFAULT_SETTINGS["TWITCH_CLIENT_ID"].secret);
    }

    #[test]
    fn unknown_key_has_no_default() {
        assert_eq!(get_default("SERVER_PORT"), Some("8080"));
        assert_eq!(get_default("PRINTER_ADDRESS"), None);
    }
}
