//! Turns detected deltas into notifications and routes clicks back to events.
//!
//! Stream and schedule notification ids are deterministic
//! (`stream_{platform}_{id}`, `schedule_{platform}_{id}`), so creating the
//! same one twice replaces rather than duplicates at the sink. Error and
//! custom ids carry a millisecond timestamp.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use platform_client::{IdentityKey, PlatformType, Schedule, Stream};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorHistory, ErrorReason, ErrorRecord};
use crate::events::{CoreEvent, EventBus};
use crate::settings::SettingsHandle;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<String>,
    #[serde(default)]
    pub require_interaction: bool,
}

/// Where notifications are displayed. Clicks come back through
/// [`NotificationDispatcher::handle_click`] and
/// [`NotificationDispatcher::handle_button_click`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show (or replace) the notification with `id`; returns the id used.
    async fn create(&self, id: &str, options: &NotificationOptions) -> Result<String, SinkError>;

    async fn clear(&self, id: &str) -> Result<bool, SinkError>;
}

/// Parsed notification id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationId {
    Stream(IdentityKey),
    Schedule(IdentityKey),
    Error(String),
    Custom(String),
}

impl NotificationId {
    /// Recover the kind and entity from an id. Anything unrecognized is custom.
    pub fn parse(id: &str) -> Self {
        let (kind, rest) = id.split_once('_').unwrap_or((id, ""));
        match kind {
            "stream" => parse_key(rest)
                .map(NotificationId::Stream)
                .unwrap_or_else(|| NotificationId::Custom(id.to_string())),
            "schedule" => parse_key(rest)
                .map(NotificationId::Schedule)
                .unwrap_or_else(|| NotificationId::Custom(id.to_string())),
            "error" => NotificationId::Error(id.to_string()),
            _ => NotificationId::Custom(id.to_string()),
        }
    }
}

fn parse_key(rest: &str) -> Option<IdentityKey> {
    let (platform, id) = rest.split_once('_')?;
    if id.is_empty() {
        return None;
    }
    Some(IdentityKey {
        platform_type: platform.parse::<PlatformType>().ok()?,
        id: id.to_string(),
    })
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationId::Stream(key) => write!(f, "stream_{key}"),
            NotificationId::Schedule(key) => write!(f, "schedule_{key}"),
            NotificationId::Error(id) | NotificationId::Custom(id) => f.write_str(id),
        }
    }
}

pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    settings: SettingsHandle,
    events: EventBus,
    errors: Arc<ErrorHistory>,
    notified: Mutex<HashSet<String>>,
    last_stamp: AtomicI64,
}

impl NotificationDispatcher {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        settings: SettingsHandle,
        events: EventBus,
        errors: Arc<ErrorHistory>,
    ) -> Self {
        Self {
            sink,
            settings,
            events,
            errors,
            notified: Mutex::new(HashSet::new()),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn is_notified(&self, id: &str) -> bool {
        self.notified
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    /// Insert into the notified set; false if it was already there.
    fn claim(&self, id: &str) -> bool {
        self.notified
            .lock()
            .map(|mut set| set.insert(id.to_string()))
            .unwrap_or(false)
    }

    fn release(&self, id: &str) {
        if let Ok(mut set) = self.notified.lock() {
            set.remove(id);
        }
    }

    /// Notify that `stream` went live. Sets `stream.notified` on success.
    pub async fn notify_new_stream(&self, stream: &mut Stream) -> Option<String> {
        let id = NotificationId::Stream(stream.identity_key()).to_string();
        if stream.notified || self.is_notified(&id) {
            tracing::debug!(%id, "Stream already notified");
            return None;
        }
        let settings = self.settings.get();
        if !settings.enable_notifications {
            return None;
        }
        if settings.notify_only_favorites && !stream.is_favorite {
            tracing::debug!(%id, "Skipping non-favorite stream");
            return None;
        }

        let options = NotificationOptions {
            title: format!("{} is live", stream.streamer_name),
            message: stream.title.clone(),
            icon_url: non_empty(&stream.thumbnail_url),
            url: non_empty(&stream.url),
            buttons: vec!["Watch".into()],
            require_interaction: false,
        };
        let created = self.create_claimed(&id, &options).await?;

        stream.notified = true;
        tracing::info!(%id, streamer = %stream.streamer_name, "Stream notification shown");
        self.events.publish(CoreEvent::StreamNotified {
            notification_id: created.clone(),
            stream: stream.clone(),
        });
        Some(created)
    }

    /// Remind that `schedule` starts soon. Sets `schedule.notified` on success.
    pub async fn notify_schedule_reminder(&self, schedule: &mut Schedule) -> Option<String> {
        let id = NotificationId::Schedule(schedule.identity_key()).to_string();
        if schedule.notified || self.is_notified(&id) {
            tracing::debug!(%id, "Schedule already notified");
            return None;
        }
        let settings = self.settings.get();
        if !settings.enable_notifications || !settings.reminders {
            return None;
        }

        let message = match schedule.scheduled_start_time {
            Some(start) => format!("{} (starts {} UTC)", schedule.title, start.format("%H:%M")),
            None => schedule.title.clone(),
        };
        let options = NotificationOptions {
            title: format!("{} starts soon", schedule.streamer_name),
            message,
            icon_url: non_empty(&schedule.thumbnail_url),
            url: non_empty(&schedule.url),
            buttons: vec!["Open".into()],
            require_interaction: false,
        };
        let created = self.create_claimed(&id, &options).await?;

        schedule.notified = true;
        tracing::info!(%id, streamer = %schedule.streamer_name, "Schedule reminder shown");
        self.events.publish(CoreEvent::ScheduleNotified {
            notification_id: created.clone(),
            schedule: schedule.clone(),
        });
        Some(created)
    }

    pub async fn notify_error(&self, record: &ErrorRecord) -> Option<String> {
        if !self.settings.get().enable_notifications {
            return None;
        }
        let id = format!("error_{}", self.next_stamp());
        let title = match record.reason {
            ErrorReason::Auth => format!("{}: sign-in required", record.source),
            _ => format!("{} error", record.source),
        };
        let options = NotificationOptions {
            title,
            message: record.message.clone(),
            require_interaction: record.reason == ErrorReason::Auth,
            ..NotificationOptions::default()
        };
        self.create(&id, &options).await
    }

    pub async fn notify_custom(&self, options: NotificationOptions) -> Option<String> {
        if !self.settings.get().enable_notifications {
            return None;
        }
        let id = format!("custom_{}", self.next_stamp());
        self.create(&id, &options).await
    }

    async fn create_claimed(&self, id: &str, options: &NotificationOptions) -> Option<String> {
        if !self.claim(id) {
            return None;
        }
        let created = self.create(id, options).await;
        if created.is_none() {
            self.release(id);
        }
        created
    }

    async fn create(&self, id: &str, options: &NotificationOptions) -> Option<String> {
        match self.sink.create(id, options).await {
            Ok(created) => Some(created),
            Err(e) => {
                self.errors.record(
                    "notifications",
                    ErrorReason::Notification,
                    format!("Failed to create notification {id}: {e}"),
                );
                None
            }
        }
    }

    /// Millisecond timestamp, strictly increasing across calls.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_stamp.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    pub async fn handle_click(&self, id: &str) -> CoreEvent {
        let event = match NotificationId::parse(id) {
            NotificationId::Stream(key) => CoreEvent::StreamClicked {
                platform_type: key.platform_type,
                stream_id: key.id,
            },
            NotificationId::Schedule(key) => CoreEvent::ScheduleClicked {
                platform_type: key.platform_type,
                schedule_id: key.id,
            },
            NotificationId::Error(notification_id) => CoreEvent::ErrorClicked { notification_id },
            NotificationId::Custom(notification_id) => CoreEvent::CustomClicked { notification_id },
        };
        self.route(id, event).await
    }

    pub async fn handle_button_click(&self, id: &str, button_index: usize) -> CoreEvent {
        let event = match NotificationId::parse(id) {
            NotificationId::Stream(key) => CoreEvent::StreamButtonClicked {
                platform_type: key.platform_type,
                stream_id: key.id,
                button_index,
            },
            NotificationId::Schedule(key) => CoreEvent::ScheduleButtonClicked {
                platform_type: key.platform_type,
                schedule_id: key.id,
                button_index,
            },
            NotificationId::Error(notification_id) => CoreEvent::ErrorButtonClicked {
                notification_id,
                button_index,
            },
            NotificationId::Custom(notification_id) => CoreEvent::CustomButtonClicked {
                notification_id,
                button_index,
            },
        };
        self.route(id, event).await
    }

    async fn route(&self, id: &str, event: CoreEvent) -> CoreEvent {
        self.events.publish(event.clone());
        if let Err(e) = self.sink.clear(id).await {
            tracing::warn!(%id, error = %e, "Failed to clear notification");
        }
        event
    }

    /// Rebuild the notified set from persisted flags. Returns how many keys were restored.
    pub fn restore(&self, streams: &[Stream], schedules: &[Schedule]) -> usize {
        let ids = streams
            .iter()
            .filter(|s| s.notified)
            .map(|s| NotificationId::Stream(s.identity_key()).to_string())
            .chain(
                schedules
                    .iter()
                    .filter(|s| s.notified)
                    .map(|s| NotificationId::Schedule(s.identity_key()).to_string()),
            );
        let Ok(mut set) = self.notified.lock() else {
            return 0;
        };
        let before = set.len();
        set.extend(ids);
        set.len() - before
    }

    /// Forget one notified id, or all of them when `id` is `None`.
    pub fn reset(&self, id: Option<&str>) -> usize {
        let cleared = match self.notified.lock() {
            Ok(mut set) => match id {
                Some(id) => usize::from(set.remove(id)),
                None => {
                    let n = set.len();
                    set.clear();
                    n
                }
            },
            Err(_) => 0,
        };
        tracing::info!(?id, cleared, "Notification state reset");
        self.events.publish(CoreEvent::NotificationsReset {
            key: id.map(str::to_string),
        });
        cleared
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
