//! Periodic poll driver with bounded fixed-delay retry.
//!
//! At most one poll runs at a time. The busy flag is taken before the first
//! await of [`Scheduler::poll`]; a poll requested while one is running is
//! skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::aggregator::AggregateError;
use crate::badge::{BadgeState, StatusBadge};
use crate::events::{CoreEvent, EventBus, PollTrigger};
use crate::settings::{MIN_UPDATE_INTERVAL_SECS, SettingsError};
use crate::store::StoreError;

/// Errors that fail a whole poll cycle and drive the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub stream_count: usize,
    pub schedule_count: usize,
}

/// One fetch → diff → notify → persist cycle.
#[async_trait]
pub trait PollTarget: Send + Sync {
    async fn poll_once(&self) -> Result<PollSummary, PollError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Delay before the first periodic poll after (re)configuration.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Polling,
    RetryPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Skipped,
    Succeeded(PollSummary),
    Failed {
        attempt: u32,
        retry_scheduled: bool,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    pub attempts: u32,
    pub interval_secs: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub retry_in_secs: Option<u64>,
}

struct SchedulerState {
    phase: SchedulerPhase,
    attempts: u32,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    retry_at: Option<Instant>,
}

/// Clears the busy flag when the poll finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    target: Arc<dyn PollTarget>,
    badge: Arc<StatusBadge>,
    events: EventBus,
    policy: RetryPolicy,
    busy: AtomicBool,
    state: Mutex<SchedulerState>,
    interval: watch::Sender<Duration>,
    wake: Notify,
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.max(Duration::from_secs(MIN_UPDATE_INTERVAL_SECS))
}

impl Scheduler {
    pub fn new(
        target: Arc<dyn PollTarget>,
        badge: Arc<StatusBadge>,
        events: EventBus,
        interval: Duration,
    ) -> Self {
        let (interval, _) = watch::channel(clamp_interval(interval));
        Self {
            target,
            badge,
            events,
            policy: RetryPolicy::default(),
            busy: AtomicBool::new(false),
            state: Mutex::new(SchedulerState {
                phase: SchedulerPhase::Idle,
                attempts: 0,
                last_success: None,
                last_error: None,
                retry_at: None,
            }),
            interval,
            wake: Notify::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Set the periodic interval and restart the periodic timer.
    pub fn configure(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), "Poll schedule reconfigured");
        self.interval.send_replace(interval);
    }

    /// Restart the periodic timer with the current interval.
    pub fn reschedule(&self) {
        self.configure(self.interval());
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SchedulerStatus {
        let interval_secs = self.interval().as_secs();
        match self.state.lock() {
            Ok(state) => SchedulerStatus {
                phase: state.phase,
                attempts: state.attempts,
                interval_secs,
                last_success: state.last_success,
                last_error: state.last_error.clone(),
                retry_in_secs: state
                    .retry_at
                    .map(|at| at.saturating_duration_since(Instant::now()).as_secs()),
            },
            Err(_) => SchedulerStatus {
                phase: SchedulerPhase::Idle,
                attempts: 0,
                interval_secs,
                last_success: None,
                last_error: None,
                retry_in_secs: None,
            },
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> Option<R> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }

    fn retry_at(&self) -> Option<Instant> {
        self.update(|state| state.retry_at).flatten()
    }

    /// Run one poll cycle unless one is already running.
    pub async fn poll(&self, trigger: PollTrigger) -> PollOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::info!(?trigger, "Poll already in progress, skipping");
            return PollOutcome::Skipped;
        };

        self.update(|state| {
            state.phase = SchedulerPhase::Polling;
            state.retry_at = None;
        });
        self.badge.set(BadgeState::Loading);
        self.events.publish(CoreEvent::PollStarted { trigger });
        tracing::debug!(?trigger, "Poll started");

        match self.target.poll_once().await {
            Ok(summary) => {
                self.update(|state| {
                    state.phase = SchedulerPhase::Idle;
                    state.attempts = 0;
                    state.last_success = Some(Utc::now());
                    state.last_error = None;
                });
                self.badge
                    .set(BadgeState::for_stream_count(summary.stream_count));
                self.events.publish(CoreEvent::PollSucceeded {
                    stream_count: summary.stream_count,
                    schedule_count: summary.schedule_count,
                });
                tracing::info!(
                    streams = summary.stream_count,
                    schedules = summary.schedule_count,
                    "Poll completed"
                );
                PollOutcome::Succeeded(summary)
            }
            Err(err) => self.fail(err),
        }
    }

    fn fail(&self, err: PollError) -> PollOutcome {
        let message = err.to_string();
        let max_attempts = self.policy.max_attempts;
        let retry_delay = self.policy.retry_delay;

        let attempt = self
            .update(|state| {
                state.attempts += 1;
                let attempt = state.attempts;
                state.last_error = Some(message.clone());
                if attempt < max_attempts {
                    state.phase = SchedulerPhase::RetryPending;
                    state.retry_at = Some(Instant::now() + retry_delay);
                } else {
                    state.phase = SchedulerPhase::Idle;
                    state.attempts = 0;
                    state.retry_at = None;
                }
                attempt
            })
            .unwrap_or(max_attempts);

        let retry_scheduled = attempt < max_attempts;
        if retry_scheduled {
            tracing::warn!(
                attempt,
                max_attempts,
                retry_in_secs = retry_delay.as_secs(),
                error = %message,
                "Poll failed, retry scheduled"
            );
            self.badge.set(BadgeState::UpdatePending);
            self.wake.notify_one();
        } else {
            tracing::error!(attempt, error = %message, "Poll failed, retries exhausted");
            self.badge.set(BadgeState::Error);
        }

        self.events.publish(CoreEvent::PollFailed {
            attempt,
            retry_in_secs: retry_scheduled.then(|| retry_delay.as_secs()),
            message: message.clone(),
        });
        PollOutcome::Failed {
            attempt,
            retry_scheduled,
            message,
        }
    }

    /// Drive periodic and retry polls until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval_rx = self.interval.subscribe();
        let mut next_periodic = Instant::now() + self.policy.initial_delay;
        tracing::info!(
            interval_secs = self.interval().as_secs(),
            "Scheduler started"
        );

        loop {
            let retry_at = self.retry_at();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler stopped");
                    break;
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let interval = *interval_rx.borrow_and_update();
                    next_periodic = Instant::now() + self.policy.initial_delay;
                    tracing::debug!(interval_secs = interval.as_secs(), "Periodic poll rescheduled");
                }
                _ = self.wake.notified() => {}
                _ = sleep_until(next_periodic) => {
                    next_periodic = Instant::now() + self.interval();
                    self.poll(PollTrigger::Periodic).await;
                }
                _ = sleep_until(retry_at.unwrap_or(next_periodic)), if retry_at.is_some() => {
                    self.poll(PollTrigger::Retry).await;
                }
            }
        }
    }
}
