//! The poll cycle: fetch, diff against the last snapshot, notify, persist.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use platform_client::{IdentityKey, PlatformType, Schedule, Stream};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::aggregator::{Aggregator, PlatformFailure};
use crate::delta::{Keyed, carry_over_notified, detect_new_streams, detect_reminders};
use crate::dispatcher::NotificationDispatcher;
use crate::errors::{ErrorHistory, ErrorReason};
use crate::events::{CoreEvent, EventBus};
use crate::scheduler::{PollError, PollSummary, PollTarget};
use crate::settings::{Settings, SettingsHandle};
use crate::store::{self, Store, StoreError, keys};

pub struct Watcher {
    aggregator: Arc<Aggregator>,
    dispatcher: Arc<NotificationDispatcher>,
    store: Arc<dyn Store>,
    settings: SettingsHandle,
    errors: Arc<ErrorHistory>,
    events: EventBus,
    auth_alerted: Mutex<HashSet<PlatformType>>,
    /// Held for a whole poll cycle and for resets.
    cycle: AsyncMutex<()>,
    /// Live streams whose notification was reset; notified again on the next cycle.
    rearmed: Mutex<HashSet<IdentityKey>>,
}

impl Watcher {
    pub fn new(
        aggregator: Arc<Aggregator>,
        dispatcher: Arc<NotificationDispatcher>,
        store: Arc<dyn Store>,
        settings: SettingsHandle,
        errors: Arc<ErrorHistory>,
        events: EventBus,
    ) -> Self {
        Self {
            aggregator,
            dispatcher,
            store,
            settings,
            errors,
            events,
            auth_alerted: Mutex::new(HashSet::new()),
            cycle: AsyncMutex::new(()),
            rearmed: Mutex::new(HashSet::new()),
        }
    }

    pub async fn streams(&self) -> Result<Vec<Stream>, StoreError> {
        self.load(keys::STREAMS).await
    }

    pub async fn schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        self.load(keys::SCHEDULES).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        match store::load::<Vec<T>>(self.store.as_ref(), key).await {
            Ok(items) => Ok(items.unwrap_or_default()),
            Err(e) => {
                self.errors
                    .record("store", ErrorReason::Persistence, format!("Failed to read {key}: {e}"));
                Err(e)
            }
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        store::save(self.store.as_ref(), key, value).await.inspect_err(|e| {
            self.errors
                .record("store", ErrorReason::Persistence, format!("Failed to write {key}: {e}"));
        })
    }

    /// Rebuild the dispatcher's notified set from the persisted snapshots.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let streams = self.streams().await?;
        let schedules = self.schedules().await?;
        let restored = self.dispatcher.restore(&streams, &schedules);
        tracing::info!(restored, "Restored notified state");
        Ok(restored)
    }

    /// Clear notified state for one notification id, or everything when `None`,
    /// both in memory and in the persisted snapshots.
    ///
    /// Waits for an in-flight poll cycle to finish first. Reset streams that
    /// are still live are notified again on the next cycle.
    pub async fn reset_notifications(&self, id: Option<&str>) -> Result<usize, StoreError> {
        let _cycle = self.cycle.lock().await;
        let cleared = self.dispatcher.reset(id);

        let mut streams = self.streams().await?;
        let mut schedules = self.schedules().await?;
        let selected = |prefix: &str, key: IdentityKey| {
            id.is_none_or(|id| id == format!("{prefix}_{key}"))
        };
        let mut rearmed = Vec::new();
        for stream in streams.iter_mut() {
            if selected("stream", stream.key()) {
                stream.notified = false;
                rearmed.push(stream.identity_key());
            }
        }
        if let Ok(mut set) = self.rearmed.lock() {
            set.extend(rearmed);
        }
        for schedule in schedules.iter_mut() {
            if selected("schedule", schedule.key()) {
                schedule.notified = false;
            }
        }
        self.save(keys::STREAMS, &streams).await?;
        self.save(keys::SCHEDULES, &schedules).await?;
        Ok(cleared)
    }

    /// Re-arm the one-time auth failure alert for `platform`.
    pub fn auth_updated(&self, platform: PlatformType) {
        if let Ok(mut alerted) = self.auth_alerted.lock() {
            alerted.remove(&platform);
        }
    }

    async fn alert_auth_failures(&self, failures: &[PlatformFailure]) {
        for failure in failures.iter().filter(|f| f.error.is_auth()) {
            self.events.publish(CoreEvent::AuthRequired {
                platform_type: failure.platform,
            });
            let first = self
                .auth_alerted
                .lock()
                .map(|mut alerted| alerted.insert(failure.platform))
                .unwrap_or(false);
            if first {
                self.dispatcher.notify_error(&failure.record).await;
            }
        }
    }

    fn mark_favorites<T: Favorite>(settings: &Settings, items: &mut [T]) {
        for item in items.iter_mut() {
            if settings.is_favorite_streamer(item.streamer_name()) {
                item.set_favorite();
            }
        }
    }

    async fn poll_streams(&self, settings: &Settings) -> Result<(Vec<Stream>, Vec<Stream>), PollError> {
        let platforms = settings.enabled_platform_list();
        let fetched = match self.aggregator.fetch_streams(&platforms).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.alert_auth_failures(e.failures()).await;
                self.errors
                    .record("aggregator", ErrorReason::TotalFailure, e.to_string());
                return Err(e.into());
            }
        };
        self.alert_auth_failures(&fetched.failures).await;

        let previous: Vec<Stream> = self.streams().await?;
        let mut current = fetched.items;
        carry_over_notified(&mut current, &previous);
        Self::mark_favorites(settings, &mut current);

        let rearmed = self
            .rearmed
            .lock()
            .map(|mut set| std::mem::take(&mut *set))
            .unwrap_or_default();
        let new: HashSet<IdentityKey> = detect_new_streams(&current, &previous)
            .iter()
            .map(Stream::identity_key)
            .chain(
                current
                    .iter()
                    .map(Stream::identity_key)
                    .filter(|key| rearmed.contains(key)),
            )
            .collect();
        if !new.is_empty() {
            tracing::info!(count = new.len(), "New live streams detected");
        }
        for stream in current.iter_mut().filter(|s| new.contains(&s.identity_key())) {
            self.dispatcher.notify_new_stream(stream).await;
        }
        Ok((current, previous))
    }

    /// Schedule failures never fail the cycle; the last snapshot is kept instead.
    async fn poll_schedules(&self, settings: &Settings) -> Result<Vec<Schedule>, PollError> {
        let platforms: Vec<PlatformType> = settings
            .enabled_platform_list()
            .into_iter()
            .filter(|p| self.aggregator.supports_schedules(*p))
            .collect();
        let previous: Vec<Schedule> = self.schedules().await?;

        let mut schedules = match self.aggregator.fetch_schedules(&platforms).await {
            Ok(fetched) => {
                self.alert_auth_failures(&fetched.failures).await;
                fetched.items
            }
            Err(e) => {
                tracing::warn!(error = %e, "Schedule fetch failed, keeping previous snapshot");
                self.alert_auth_failures(e.failures()).await;
                previous.clone()
            }
        };
        carry_over_notified(&mut schedules, &previous);
        Self::mark_favorites(settings, &mut schedules);

        let due: HashSet<IdentityKey> = detect_reminders(&schedules, Utc::now(), settings.reminder_time)
            .iter()
            .map(Schedule::identity_key)
            .collect();
        for schedule in schedules.iter_mut().filter(|s| due.contains(&s.identity_key())) {
            self.dispatcher.notify_schedule_reminder(schedule).await;
        }
        Ok(schedules)
    }
}

/// Entities that can be marked favorite by streamer name.
trait Favorite {
    fn streamer_name(&self) -> &str;
    fn set_favorite(&mut self);
}

impl Favorite for Stream {
    fn streamer_name(&self) -> &str {
        &self.streamer_name
    }

    fn set_favorite(&mut self) {
        self.is_favorite = true;
    }
}

impl Favorite for Schedule {
    fn streamer_name(&self) -> &str {
        &self.streamer_name
    }

    fn set_favorite(&mut self) {
        self.is_favorite = true;
    }
}

#[async_trait]
impl PollTarget for Watcher {
    async fn poll_once(&self) -> Result<PollSummary, PollError> {
        let _cycle = self.cycle.lock().await;
        let settings = self.settings.get();
        let (current, previous) = self.poll_streams(&settings).await?;
        let schedules = self.poll_schedules(&settings).await?;

        self.save(keys::PREVIOUS_STREAMS, &previous).await?;
        self.save(keys::STREAMS, &current).await?;
        self.save(keys::SCHEDULES, &schedules).await?;

        let summary = PollSummary {
            stream_count: current.len(),
            schedule_count: schedules.len(),
        };
        self.events.publish(CoreEvent::DataUpdated {
            stream_count: summary.stream_count,
            schedule_count: summary.schedule_count,
        });
        Ok(summary)
    }
}
