//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_TWITCH_CLIENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z]{20,40}$").unwrap());
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());
static RE_YOUTUBE_CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").unwrap());
static RE_TWITCASTING_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_:]{1,64}$").unwrap());
static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_\-.]+$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
/// Empty values are accepted for every credential key (platform left unconfigured).
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "SERVER_PORT" => validate_int_range(value, 1, 65535)?,
        "TWITCH_CLIENT_ID" => {
            if !value.is_empty() && !RE_TWITCH_CLIENT_ID.is_match(value) {
                return Err("must be 20-40 lowercase alphanumeric characters".into());
            }
        }
        "TWITCH_USER_ID" => {
            if !value.is_empty() && !RE_DIGITS.is_match(value) {
                return Err("must be a numeric user id".into());
            }
        }
        "TWITCH_ACCESS_TOKEN" | "YOUTUBE_API_KEY" | "TWITCASTING_ACCESS_TOKEN" => {
            if !value.is_empty() && !RE_TOKEN.is_match(value) {
                return Err("contains invalid characters".into());
            }
        }
        "YOUTUBE_CHANNEL_IDS" => validate_list(value, &RE_YOUTUBE_CHANNEL, "YouTube channel id")?,
        "TWITCASTING_USER_IDS" => {
            validate_list(value, &RE_TWITCASTING_USER, "TwitCasting user id")?
        }
        _ => {}
    }
    Ok(())
}

/// Split a comma-separated setting into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn validate_list(value: &str, re: &Regex, what: &str) -> Result<(), String> {
    match split_list(value).iter().find(|entry| !re.is_match(entry)) {
        Some(bad) => Err(format!("invalid {what}: {bad}")),
        None => Ok(()),
    }
}

fn validate_int_range(value: &str, min: i32, max: i32) -> Result<(), String> {
    let v: i32 = value.parse().map_err(|_| "must be an integer")?;
    if !(min..=max).contains(&v) {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_server_port() {
        assert!(validate_setting("SERVER_PORT", "8080").is_ok());
        assert!(validate_setting("SERVER_PORT", "0").is_err());
        assert!(validate_setting("SERVER_PORT", "70000").is_err());
        assert!(validate_setting("SERVER_PORT", "http").is_err());
    }

    #[test]
    fn test_empty_credentials_are_allowed() {
        for key in [
            "TWITCH_CLIENT_ID",
            "TWITCH_USER_ID",
            "TWITCH_ACCESS_TOKEN",
            "YOUTUBE_API_KEY",
            "YOUTUBE_CHANNEL_IDS",
            "TWITCASTING_ACCESS_TOKEN",
            "TWITCASTING_USER_IDS",
        ] {
            assert!(validate_setting(key, "").is_ok(), "{key}");
        }
    }

    #[test]
    fn test_twitch_ids() {
        assert!(validate_setting("TWITCH_CLIENT_ID", "abcdefghij0123456789abcdefghij").is_ok());
        assert!(validate_setting("TWITCH_CLIENT_ID", "ABC").is_err());
        assert!(validate_setting("TWITCH_USER_ID", "12345").is_ok());
        assert!(validate_setting("TWITCH_USER_ID", "someone").is_err());
    }

    #[test]
    fn test_youtube_channel_list() {
        assert!(
            validate_setting(
                "YOUTUBE_CHANNEL_IDS",
                "UC1234567890abcdefghijkl, UCabcdefghijkl1234567890"
            )
            .is_ok()
        );
        let err = validate_setting("YOUTUBE_CHANNEL_IDS", "UC1234567890abcdefghijkl,nope")
            .unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn test_tokens_reject_whitespace() {
        assert!(validate_setting("TWITCH_ACCESS_TOKEN", "abc def").is_err());
        assert!(validate_setting("TWITCASTING_ACCESS_TOKEN", "abc.def-ghi_1").is_ok());
    }

    #[test]
    fn test_split_list_trims_and_skips_empty() {
        assert_eq!(split_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_unknown_key_is_not_validated() {
        assert!(validate_setting("SOMETHING_ELSE", "anything goes").is_ok());
    }
}
