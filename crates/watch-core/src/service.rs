//! Top-level context owning every core component, plus the request/response
//! messaging surface used by UI collaborators.

use std::str::FromStr;
use std::sync::Arc;

use platform_client::{PlatformClient, PlatformType};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::aggregator::Aggregator;
use crate::badge::{BadgeState, StatusBadge};
use crate::dispatcher::{NotificationDispatcher, NotificationSink};
use crate::errors::ErrorHistory;
use crate::events::{CoreEvent, EventBus, PollTrigger};
use crate::scheduler::{PollOutcome, RetryPolicy, Scheduler};
use crate::settings::{Settings, SettingsError, SettingsHandle, SettingsPatch};
use crate::store::{Store, StoreError};
use crate::watcher::Watcher;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Streams,
    Schedules,
    Settings,
    Errors,
    Status,
}

impl FromStr for DataType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streams" => Ok(DataType::Streams),
            "schedules" => Ok(DataType::Schedules),
            "settings" => Ok(DataType::Settings),
            "errors" => Ok(DataType::Errors),
            "status" => Ok(DataType::Status),
            other => Err(ServiceError::UnknownDataType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    Refresh,
    SettingsUpdated {
        #[serde(default)]
        settings: Option<SettingsPatch>,
    },
    GetData {
        data_type: DataType,
    },
    AuthUpdated {
        platform_type: PlatformType,
    },
    ResetNotifications {
        #[serde(default)]
        id: Option<String>,
    },
    NotificationClicked {
        id: String,
    },
    NotificationButtonClicked {
        id: String,
        button_index: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Poll(PollOutcome),
    Settings(Settings),
    Data(Value),
    Ack,
    Reset { cleared: usize },
    Event(CoreEvent),
}

pub struct WatchService {
    store: Arc<dyn Store>,
    settings: SettingsHandle,
    events: EventBus,
    errors: Arc<ErrorHistory>,
    badge: Arc<StatusBadge>,
    aggregator: Arc<Aggregator>,
    dispatcher: Arc<NotificationDispatcher>,
    watcher: Arc<Watcher>,
    scheduler: Arc<Scheduler>,
}

impl WatchService {
    /// Load settings, wire the components together and restore the notified
    /// set from the persisted snapshots.
    pub async fn start(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        clients: Vec<Arc<dyn PlatformClient>>,
        events: EventBus,
    ) -> Result<Self, ServiceError> {
        Self::start_with_policy(store, sink, clients, events, RetryPolicy::default()).await
    }

    pub async fn start_with_policy(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        clients: Vec<Arc<dyn PlatformClient>>,
        events: EventBus,
        policy: RetryPolicy,
    ) -> Result<Self, ServiceError> {
        let settings = SettingsHandle::new(Settings::load(store.as_ref()).await?);
        let errors = Arc::new(ErrorHistory::new(events.clone()));
        let badge = Arc::new(StatusBadge::new(events.clone()));

        let aggregator = Arc::new(Aggregator::new(errors.clone()));
        for client in clients {
            aggregator.register(client);
        }
        let dispatcher = Arc::new(NotificationDispatcher::new(
            sink,
            settings.clone(),
            events.clone(),
            errors.clone(),
        ));
        let watcher = Arc::new(Watcher::new(
            aggregator.clone(),
            dispatcher.clone(),
            store.clone(),
            settings.clone(),
            errors.clone(),
            events.clone(),
        ));
        let scheduler = Arc::new(
            Scheduler::new(
                watcher.clone(),
                badge.clone(),
                events.clone(),
                settings.get().poll_interval(),
            )
            .with_policy(policy),
        );

        watcher.restore().await?;

        Ok(Self {
            store,
            settings,
            events,
            errors,
            badge,
            aggregator,
            dispatcher,
            watcher,
            scheduler,
        })
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.aggregator.clone()
    }

    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    pub fn errors(&self) -> Arc<ErrorHistory> {
        self.errors.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    pub fn badge(&self) -> BadgeState {
        self.badge.current()
    }

    pub async fn handle(&self, request: Request) -> Result<Response, ServiceError> {
        tracing::debug!(?request, "Handling request");
        match request {
            Request::Refresh => Ok(Response::Poll(self.refresh().await)),
            Request::SettingsUpdated { settings } => {
                let updated = match settings {
                    Some(patch) => self.update_settings(&patch).await?,
                    None => self.reload_settings().await?,
                };
                Ok(Response::Settings(updated))
            }
            Request::GetData { data_type } => Ok(Response::Data(self.get_data(data_type).await?)),
            Request::AuthUpdated { platform_type } => {
                self.auth_updated(platform_type);
                Ok(Response::Ack)
            }
            Request::ResetNotifications { id } => {
                let cleared = self.watcher.reset_notifications(id.as_deref()).await?;
                Ok(Response::Reset { cleared })
            }
            Request::NotificationClicked { id } => {
                Ok(Response::Event(self.dispatcher.handle_click(&id).await))
            }
            Request::NotificationButtonClicked { id, button_index } => Ok(Response::Event(
                self.dispatcher.handle_button_click(&id, button_index).await,
            )),
        }
    }

    /// Forced poll; respects the single in-flight poll rule.
    pub async fn refresh(&self) -> PollOutcome {
        self.scheduler.poll(PollTrigger::Manual).await
    }

    /// Apply a patch, save the full settings and reschedule polling.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, ServiceError> {
        let next = patch.apply(&self.settings.get())?;
        next.save(self.store.as_ref()).await?;
        self.apply_settings(next.clone());
        Ok(next)
    }

    /// Re-read settings written by another process or UI.
    pub async fn reload_settings(&self) -> Result<Settings, ServiceError> {
        let settings = Settings::load(self.store.as_ref()).await?;
        self.apply_settings(settings.clone());
        Ok(settings)
    }

    fn apply_settings(&self, settings: Settings) {
        let interval = settings.poll_interval();
        self.settings.replace(settings.clone());
        self.scheduler.configure(interval);
        self.events.publish(CoreEvent::SettingsChanged { settings });
    }

    /// New credentials were stored for `platform`: re-arm its auth alert and
    /// poll again soon.
    pub fn auth_updated(&self, platform: PlatformType) {
        tracing::info!(%platform, "Credentials updated");
        self.watcher.auth_updated(platform);
        self.scheduler.reschedule();
    }

    pub async fn get_data(&self, data_type: DataType) -> Result<Value, ServiceError> {
        let value = match data_type {
            DataType::Streams => json!(self.watcher.streams().await?),
            DataType::Schedules => json!(self.watcher.schedules().await?),
            DataType::Settings => json!(self.settings.get()),
            DataType::Errors => json!(self.errors.all()),
            DataType::Status => json!({
                "scheduler": self.scheduler.status(),
                "badge": self.badge.current().badge(),
            }),
        };
        Ok(value)
    }
}
