//! Polling and notification coordination core.
//!
//! [`WatchService`] owns every component: the [`Aggregator`] fans out to the
//! platform clients, the [`delta`] functions diff snapshots, the
//! [`NotificationDispatcher`] deduplicates and routes notifications, and the
//! [`Scheduler`] drives the [`Watcher`] poll cycle with retry.

pub mod aggregator;
pub mod badge;
pub mod delta;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregateError, Aggregated, Aggregator, FetchKind, Fetched, PlatformFailure};
pub use badge::{Badge, BadgeColor, BadgeState, StatusBadge};
pub use dispatcher::{NotificationDispatcher, NotificationId, NotificationOptions, NotificationSink, SinkError};
pub use errors::{ErrorHistory, ErrorReason, ErrorRecord};
pub use events::{CoreEvent, EventBus, PollTrigger};
pub use scheduler::{PollError, PollOutcome, PollSummary, PollTarget, RetryPolicy, Scheduler, SchedulerPhase, SchedulerStatus};
pub use service::{DataType, Request, Response, ServiceError, WatchService};
pub use settings::{Settings, SettingsError, SettingsHandle, SettingsPatch};
pub use store::{MemoryStore, Store, StoreError};
pub use watcher::Watcher;
