//! Fakes for the core's collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use platform_client::{
    ClientOptions, FetchOptions, PlatformClient, PlatformError, PlatformType, Schedule, Stream,
};
use serde_json::Value;
use tokio::sync::Notify;

use crate::dispatcher::{NotificationOptions, NotificationSink, SinkError};
use crate::store::{MemoryStore, Store, StoreError};

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Api,
    Auth,
    /// Never answers within any reasonable timeout.
    Hang,
}

impl Failure {
    fn error(self) -> PlatformError {
        match self {
            Failure::Api => PlatformError::ApiError {
                status: 500,
                message: "internal error".into(),
            },
            Failure::Auth => PlatformError::Unauthorized("token expired".into()),
            Failure::Hang => PlatformError::Timeout,
        }
    }
}

pub fn streams_for(platform: PlatformType, ids: &[&str]) -> Vec<Stream> {
    ids.iter()
        .map(|id| Stream::new(platform, *id, format!("streamer-{id}"), format!("title {id}")))
        .collect()
}

pub struct FakeClient {
    platform: PlatformType,
    streams: Mutex<Result<Vec<Stream>, Failure>>,
    schedules: Mutex<Option<Result<Vec<Schedule>, Failure>>>,
    stream_calls: AtomicUsize,
    options: Mutex<Option<ClientOptions>>,
}

impl FakeClient {
    pub fn new(platform: PlatformType) -> Self {
        Self {
            platform,
            streams: Mutex::new(Ok(Vec::new())),
            schedules: Mutex::new(None),
            stream_calls: AtomicUsize::new(0),
            options: Mutex::new(None),
        }
    }

    pub fn with_streams(self, streams: Vec<Stream>) -> Self {
        self.set_streams(streams);
        self
    }

    pub fn failing(self, failure: Failure) -> Self {
        self.set_failure(failure);
        self
    }

    pub fn with_schedules(self, schedules: Vec<Schedule>) -> Self {
        self.set_schedules(Ok(schedules));
        self
    }

    pub fn set_streams(&self, streams: Vec<Stream>) {
        *self.streams.lock().unwrap() = Ok(streams);
    }

    pub fn set_failure(&self, failure: Failure) {
        *self.streams.lock().unwrap() = Err(failure);
    }

    pub fn set_schedules(&self, schedules: Result<Vec<Schedule>, Failure>) {
        *self.schedules.lock().unwrap() = Some(schedules);
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> Option<ClientOptions> {
        self.options.lock().unwrap().clone()
    }
}

async fn reply<T: Clone>(outcome: Result<Vec<T>, Failure>) -> Result<Vec<T>, PlatformError> {
    match outcome {
        Ok(items) => Ok(items),
        Err(Failure::Hang) => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(Failure::Hang.error())
        }
        Err(failure) => Err(failure.error()),
    }
}

#[async_trait]
impl PlatformClient for FakeClient {
    fn platform(&self) -> PlatformType {
        self.platform
    }

    async fn initialize(&self, options: ClientOptions) -> Result<(), PlatformError> {
        *self.options.lock().unwrap() = Some(options);
        Ok(())
    }

    async fn get_streams(&self, _options: &FetchOptions) -> Result<Vec<Stream>, PlatformError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.streams.lock().unwrap().clone();
        reply(outcome).await
    }

    fn supports_schedules(&self) -> bool {
        self.schedules.lock().unwrap().is_some()
    }

    async fn get_schedules(&self, _options: &FetchOptions) -> Result<Vec<Schedule>, PlatformError> {
        let outcome = self.schedules.lock().unwrap().clone();
        match outcome {
            Some(outcome) => reply(outcome).await,
            None => Err(PlatformError::Unsupported("schedules")),
        }
    }
}

/// Holds one `create` call open until released.
#[derive(Clone, Default)]
pub struct SinkGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Sink that remembers every created and cleared notification.
#[derive(Default)]
pub struct RecordingSink {
    created: Mutex<Vec<(String, NotificationOptions)>>,
    cleared: Mutex<Vec<String>>,
    fail: AtomicBool,
    held: Mutex<Option<(String, SinkGate)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Block the next `create` for `id` until the returned gate is released.
    pub fn hold(&self, id: &str) -> SinkGate {
        let gate = SinkGate::default();
        *self.held.lock().unwrap() = Some((id.to_string(), gate.clone()));
        gate
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn created(&self) -> Vec<(String, NotificationOptions)> {
        self.created.lock().unwrap().clone()
    }

    pub fn cleared_ids(&self) -> Vec<String> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn create(&self, id: &str, options: &NotificationOptions) -> Result<String, SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("display offline".into()));
        }
        let gate = self
            .held
            .lock()
            .unwrap()
            .take_if(|(held, _)| held.as_str() == id)
            .map(|(_, gate)| gate);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.created
            .lock()
            .unwrap()
            .push((id.to_string(), options.clone()));
        Ok(id.to_string())
    }

    async fn clear(&self, id: &str) -> Result<bool, SinkError> {
        self.cleared.lock().unwrap().push(id.to_string());
        Ok(true)
    }
}

/// In-memory store whose reads and writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove(keys).await
    }
}
