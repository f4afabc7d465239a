//! Bounded history of non-fatal and fatal errors, newest last.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use platform_client::PlatformError;
use serde::{Deserialize, Serialize};

use crate::events::{CoreEvent, EventBus};

pub const MAX_ERROR_ENTRIES: usize = 50;

/// Error category shown to the UI. `Auth` prompts re-authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    Network,
    Timeout,
    Auth,
    Api,
    Unsupported,
    Config,
    Persistence,
    Notification,
    TotalFailure,
}

impl ErrorReason {
    pub fn from_platform(err: &PlatformError) -> Self {
        match err {
            e if e.is_auth() => ErrorReason::Auth,
            PlatformError::Timeout => ErrorReason::Timeout,
            PlatformError::Http(e) if e.is_timeout() => ErrorReason::Timeout,
            PlatformError::Http(_) => ErrorReason::Network,
            PlatformError::Unsupported(_) => ErrorReason::Unsupported,
            PlatformError::NotConfigured(_)
            | PlatformError::InvalidHeader(_)
            | PlatformError::UrlParse(_) => ErrorReason::Config,
            _ => ErrorReason::Api,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    /// Component or platform the error came from, e.g. `twitch` or `store`.
    pub source: String,
    pub reason: ErrorReason,
    pub message: String,
}

pub struct ErrorHistory {
    entries: Mutex<VecDeque<ErrorRecord>>,
    events: EventBus,
}

impl ErrorHistory {
    pub fn new(events: EventBus) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(MAX_ERROR_ENTRIES)),
            events,
        }
    }

    pub fn record(
        &self,
        source: impl Into<String>,
        reason: ErrorReason,
        message: impl Into<String>,
    ) -> ErrorRecord {
        let record = ErrorRecord {
            timestamp: Utc::now(),
            source: source.into(),
            reason,
            message: message.into(),
        };
        tracing::warn!(
            source = %record.source,
            reason = ?record.reason,
            "{}",
            record.message
        );

        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= MAX_ERROR_ENTRIES {
                entries.pop_front();
            }
            entries.push_back(record.clone());
        }
        self.events.publish(CoreEvent::ErrorRecorded {
            record: record.clone(),
        });
        record
    }

    pub fn record_platform(&self, source: impl Into<String>, err: &PlatformError) -> ErrorRecord {
        self.record(source, ErrorReason::from_platform(err), err.to_string())
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<ErrorRecord> {
        self.recent(MAX_ERROR_ENTRIES)
    }

    pub fn clear(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let cleared = entries.len();
        entries.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let history = ErrorHistory::new(EventBus::new());
        for i in 0..(MAX_ERROR_ENTRIES + 5) {
            history.record("twitch", ErrorReason::Network, format!("failure {i}"));
        }
        let all = history.all();
        assert_eq!(all.len(), MAX_ERROR_ENTRIES);
        assert_eq!(all[0].message, "failure 5");
        assert_eq!(all[MAX_ERROR_ENTRIES - 1].message, "failure 54");
    }

    #[test]
    fn recent_returns_tail() {
        let history = ErrorHistory::new(EventBus::new());
        history.record("a", ErrorReason::Api, "one");
        history.record("b", ErrorReason::Api, "two");
        history.record("c", ErrorReason::Api, "three");
        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "two");
        assert_eq!(history.clear(), 3);
        assert!(history.all().is_empty());
    }

    #[test]
    fn platform_errors_map_to_reasons() {
        assert_eq!(
            ErrorReason::from_platform(&PlatformError::Unauthorized("expired".into())),
            ErrorReason::Auth
        );
        assert_eq!(
            ErrorReason::from_platform(&PlatformError::Timeout),
            ErrorReason::Timeout
        );
        assert_eq!(
            ErrorReason::from_platform(&PlatformError::Unsupported("schedules")),
            ErrorReason::Unsupported
        );
        assert_eq!(
            ErrorReason::from_platform(&PlatformError::ApiError {
                status: 500,
                message: "boom".into()
            }),
            ErrorReason::Api
        );
    }

    #[tokio::test]
    async fn record_publishes_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let history = ErrorHistory::new(bus);
        history.record("store", ErrorReason::Persistence, "disk full");
        match rx.recv().await.unwrap() {
            CoreEvent::ErrorRecorded { record } => {
                assert_eq!(record.source, "store");
                assert_eq!(record.reason, ErrorReason::Persistence);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
