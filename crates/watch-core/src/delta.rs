//! Snapshot diffing: newly live streams and imminent schedules.
//!
//! Everything here compares by identity key only; title or viewer-count
//! changes never make an entry "new".

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use platform_client::{IdentityKey, Schedule, Stream};

/// Anything with a `(platform_type, id)` identity and a `notified` flag.
pub trait Keyed {
    fn key(&self) -> IdentityKey;
    fn notified(&self) -> bool;
    fn set_notified(&mut self, notified: bool);
}

impl Keyed for Stream {
    fn key(&self) -> IdentityKey {
        self.identity_key()
    }

    fn notified(&self) -> bool {
        self.notified
    }

    fn set_notified(&mut self, notified: bool) {
        self.notified = notified;
    }
}

impl Keyed for Schedule {
    fn key(&self) -> IdentityKey {
        self.identity_key()
    }

    fn notified(&self) -> bool {
        self.notified
    }

    fn set_notified(&mut self, notified: bool) {
        self.notified = notified;
    }
}

/// Streams in `current` whose identity key does not appear in `previous`.
pub fn detect_new_streams(current: &[Stream], previous: &[Stream]) -> Vec<Stream> {
    let seen: HashSet<IdentityKey> = previous.iter().map(Stream::identity_key).collect();
    current
        .iter()
        .filter(|s| !seen.contains(&s.identity_key()))
        .cloned()
        .collect()
}

/// Un-notified schedules starting in `(now, now + threshold_minutes]`.
pub fn detect_reminders(
    schedules: &[Schedule],
    now: DateTime<Utc>,
    threshold_minutes: i64,
) -> Vec<Schedule> {
    let limit = now + Duration::minutes(threshold_minutes);
    schedules
        .iter()
        .filter(|s| !s.notified)
        .filter(|s| {
            s.scheduled_start_time
                .is_some_and(|start| start > now && start <= limit)
        })
        .cloned()
        .collect()
}

/// Drop entries whose key was already seen; the first occurrence wins.
pub fn dedupe_by_key<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    let before = items.len();
    let deduped: Vec<T> = items.into_iter().filter(|i| seen.insert(i.key())).collect();
    if deduped.len() != before {
        tracing::debug!(dropped = before - deduped.len(), "Dropped duplicate entries");
    }
    deduped
}

/// Copy `notified = true` from `previous` onto matching keys in `current`.
/// Never clears a flag that is already set.
pub fn carry_over_notified<T: Keyed>(current: &mut [T], previous: &[T]) {
    let notified: HashSet<IdentityKey> = previous
        .iter()
        .filter(|p| p.notified())
        .map(T::key)
        .collect();
    for item in current.iter_mut() {
        if notified.contains(&item.key()) {
            item.set_notified(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::PlatformType;

    fn stream(platform: PlatformType, id: &str) -> Stream {
        Stream::new(platform, id, format!("streamer-{id}"), "title")
    }

    fn schedule_in(id: &str, now: DateTime<Utc>, minutes: i64) -> Schedule {
        Schedule::new(
            PlatformType::Twitch,
            id,
            "streamer",
            "planned",
            Some(now + Duration::minutes(minutes)),
        )
    }

    #[test]
    fn new_streams_exclude_previously_seen_keys() {
        let previous = vec![stream(PlatformType::Twitch, "1")];
        let mut changed = stream(PlatformType::Twitch, "1");
        changed.title = "different title".into();
        changed.viewer_count = 999;
        let current = vec![
            changed,
            stream(PlatformType::Twitch, "2"),
            stream(PlatformType::YouTube, "1"),
        ];

        let new = detect_new_streams(&current, &previous);
        let keys: Vec<String> = new.iter().map(|s| s.identity_key().to_string()).collect();
        assert_eq!(keys, vec!["twitch_2", "youtube_1"]);
    }

    #[test]
    fn detection_is_idempotent() {
        let previous = vec![stream(PlatformType::Twitch, "1")];
        let current = vec![
            stream(PlatformType::Twitch, "1"),
            stream(PlatformType::TwitCasting, "9"),
        ];
        let first = detect_new_streams(&current, &previous);
        let second = detect_new_streams(&current, &previous);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn everything_is_new_without_previous_snapshot() {
        let current = vec![stream(PlatformType::Twitch, "1"), stream(PlatformType::Twitch, "2")];
        assert_eq!(detect_new_streams(&current, &[]).len(), 2);
    }

    #[test]
    fn reminder_window_includes_nine_excludes_eleven_minutes() {
        let now = Utc::now();
        let schedules = vec![schedule_in("soon", now, 9), schedule_in("later", now, 11)];
        let due = detect_reminders(&schedules, now, 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "soon");
    }

    #[test]
    fn reminders_skip_past_notified_and_undated() {
        let now = Utc::now();
        let mut notified = schedule_in("done", now, 5);
        notified.notified = true;
        let exact = schedule_in("edge", now, 10);
        let started = schedule_in("started", now, 0);
        let past = schedule_in("past", now, -5);
        let undated = Schedule::new(PlatformType::YouTube, "x", "s", "t", None);

        let due = detect_reminders(&[notified, exact, started, past, undated], now, 10);
        let ids: Vec<&str> = due.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["edge"]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut first = stream(PlatformType::Twitch, "1");
        first.title = "first".into();
        let mut dup = stream(PlatformType::Twitch, "1");
        dup.title = "dup".into();
        let deduped = dedupe_by_key(vec![first, stream(PlatformType::YouTube, "1"), dup]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
    }

    #[test]
    fn carry_over_preserves_notified_by_key() {
        let mut previous_stream = stream(PlatformType::Twitch, "1");
        previous_stream.notified = true;
        let previous = vec![previous_stream, stream(PlatformType::Twitch, "2")];

        let mut current = vec![
            stream(PlatformType::Twitch, "1"),
            stream(PlatformType::Twitch, "2"),
            stream(PlatformType::Twitch, "3"),
        ];
        carry_over_notified(&mut current, &previous);
        let flags: Vec<bool> = current.iter().map(|s| s.notified).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn carry_over_never_clears_flags() {
        let mut current = vec![stream(PlatformType::Twitch, "1")];
        current[0].notified = true;
        carry_over_notified(&mut current, &[stream(PlatformType::Twitch, "1")]);
        assert!(current[0].notified);
    }
}
