//! Single-value status indicator driven by the poll lifecycle.

use std::sync::Mutex;

use serde::Serialize;

use crate::events::{CoreEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeColor {
    Neutral,
    Info,
    Warning,
    Error,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub text: String,
    pub color: BadgeColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "count")]
pub enum BadgeState {
    Loading,
    Error,
    UpdatePending,
    Normal,
    Count(usize),
}

impl BadgeState {
    /// State after a successful poll with `live` current streams.
    pub fn for_stream_count(live: usize) -> Self {
        if live == 0 {
            BadgeState::Normal
        } else {
            BadgeState::Count(live)
        }
    }

    pub fn badge(&self) -> Badge {
        let (text, color) = match self {
            BadgeState::Loading => ("...".to_string(), BadgeColor::Info),
            BadgeState::Error => ("!".to_string(), BadgeColor::Error),
            BadgeState::UpdatePending => ("↻".to_string(), BadgeColor::Warning),
            BadgeState::Normal => (String::new(), BadgeColor::Neutral),
            BadgeState::Count(n) if *n > 99 => ("99+".to_string(), BadgeColor::Live),
            BadgeState::Count(n) => (n.to_string(), BadgeColor::Live),
        };
        Badge { text, color }
    }
}

pub struct StatusBadge {
    state: Mutex<BadgeState>,
    events: EventBus,
}

impl StatusBadge {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(BadgeState::Normal),
            events,
        }
    }

    pub fn set(&self, next: BadgeState) {
        let changed = match self.state.lock() {
            Ok(mut state) if *state != next => {
                *state = next;
                true
            }
            _ => false,
        };
        if changed {
            tracing::debug!(state = ?next, "Badge updated");
            self.events.publish(CoreEvent::BadgeChanged { badge: next.badge() });
        }
    }

    pub fn current(&self) -> BadgeState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(BadgeState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_maps_to_live_badge() {
        assert_eq!(BadgeState::for_stream_count(0), BadgeState::Normal);
        assert_eq!(BadgeState::for_stream_count(3).badge().text, "3");
        assert_eq!(BadgeState::Count(150).badge().text, "99+");
        assert_eq!(BadgeState::Error.badge().color, BadgeColor::Error);
        assert_eq!(BadgeState::Normal.badge().text, "");
    }

    #[tokio::test]
    async fn only_changes_are_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let badge = StatusBadge::new(bus);

        badge.set(BadgeState::Loading);
        badge.set(BadgeState::Loading);
        badge.set(BadgeState::Count(2));

        let mut texts = Vec::new();
        while let Ok(CoreEvent::BadgeChanged { badge }) = rx.try_recv() {
            texts.push(badge.text);
        }
        assert_eq!(texts, vec!["...".to_string(), "2".to_string()]);
        assert_eq!(badge.current(), BadgeState::Count(2));
    }
}
