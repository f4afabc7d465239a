//! Typed domain events published by the core.
//!
//! Serialized as `{"type": ..., "data": {...}}`, the same envelope the
//! WebSocket layer forwards to clients.

use platform_client::{PlatformType, Schedule, Stream};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::badge::Badge;
use crate::errors::ErrorRecord;
use crate::settings::Settings;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What started a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollTrigger {
    Periodic,
    Retry,
    Manual,
}

#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum CoreEvent {
    StreamNotified {
        notification_id: String,
        stream: Stream,
    },
    ScheduleNotified {
        notification_id: String,
        schedule: Schedule,
    },
    StreamClicked {
        platform_type: PlatformType,
        stream_id: String,
    },
    StreamButtonClicked {
        platform_type: PlatformType,
        stream_id: String,
        button_index: usize,
    },
    ScheduleClicked {
        platform_type: PlatformType,
        schedule_id: String,
    },
    ScheduleButtonClicked {
        platform_type: PlatformType,
        schedule_id: String,
        button_index: usize,
    },
    ErrorClicked {
        notification_id: String,
    },
    ErrorButtonClicked {
        notification_id: String,
        button_index: usize,
    },
    CustomClicked {
        notification_id: String,
    },
    CustomButtonClicked {
        notification_id: String,
        button_index: usize,
    },
    NotificationsReset {
        key: Option<String>,
    },
    ErrorRecorded {
        record: ErrorRecord,
    },
    AuthRequired {
        platform_type: PlatformType,
    },
    PollStarted {
        trigger: PollTrigger,
    },
    PollSucceeded {
        stream_count: usize,
        schedule_count: usize,
    },
    PollFailed {
        attempt: u32,
        retry_in_secs: Option<u64>,
        message: String,
    },
    SettingsChanged {
        settings: Settings,
    },
    BadgeChanged {
        badge: Badge,
    },
    DataUpdated {
        stream_count: usize,
        schedule_count: usize,
    },
}

/// Broadcast bus for [`CoreEvent`]s. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }
}
