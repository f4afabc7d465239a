//! Fan-out fetch across platform clients with settle-all semantics.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use platform_client::{FetchOptions, PlatformClient, PlatformError, PlatformType, Schedule, Stream};
use serde::Serialize;

use crate::delta::{Keyed, dedupe_by_key};
use crate::errors::{ErrorHistory, ErrorRecord};

/// Per-platform request budget; exceeding it counts as an ordinary failure.
pub const PLATFORM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    Streams,
    Schedules,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchKind::Streams => "streams",
            FetchKind::Schedules => "schedules",
        })
    }
}

/// One platform's failed fetch, already recorded in the error history.
#[derive(Debug)]
pub struct PlatformFailure {
    pub platform: PlatformType,
    pub error: PlatformError,
    pub record: ErrorRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("All platforms failed to fetch {kind}: {summary}", summary = summarize(.failures))]
    AllFailed {
        kind: FetchKind,
        failures: Vec<PlatformFailure>,
    },
}

impl AggregateError {
    pub fn failures(&self) -> &[PlatformFailure] {
        match self {
            AggregateError::AllFailed { failures, .. } => failures,
        }
    }
}

fn summarize(failures: &[PlatformFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.platform, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merged items from every platform that succeeded, plus the ones that didn't.
#[derive(Debug)]
pub struct Aggregated<T> {
    pub items: Vec<T>,
    pub failures: Vec<PlatformFailure>,
}

#[derive(Debug)]
pub enum Fetched {
    Streams(Aggregated<Stream>),
    Schedules(Aggregated<Schedule>),
}

pub struct Aggregator {
    clients: RwLock<HashMap<PlatformType, Arc<dyn PlatformClient>>>,
    errors: Arc<ErrorHistory>,
    fetch_options: FetchOptions,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(errors: Arc<ErrorHistory>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            errors,
            fetch_options: FetchOptions::default(),
            timeout: PLATFORM_TIMEOUT,
        }
    }

    pub fn with_client(self, client: Arc<dyn PlatformClient>) -> Self {
        self.register(client);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    /// Register or replace the client for its platform.
    pub fn register(&self, client: Arc<dyn PlatformClient>) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(client.platform(), client);
        }
    }

    pub fn client(&self, platform: PlatformType) -> Option<Arc<dyn PlatformClient>> {
        self.clients
            .read()
            .ok()
            .and_then(|clients| clients.get(&platform).cloned())
    }

    pub fn supports_schedules(&self, platform: PlatformType) -> bool {
        self.client(platform)
            .is_some_and(|client| client.supports_schedules())
    }

    pub async fn fetch_all(
        &self,
        platforms: &[PlatformType],
        kind: FetchKind,
    ) -> Result<Fetched, AggregateError> {
        match kind {
            FetchKind::Streams => self.fetch_streams(platforms).await.map(Fetched::Streams),
            FetchKind::Schedules => self
                .fetch_schedules(platforms)
                .await
                .map(Fetched::Schedules),
        }
    }

    pub async fn fetch_streams(
        &self,
        platforms: &[PlatformType],
    ) -> Result<Aggregated<Stream>, AggregateError> {
        let options = &self.fetch_options;
        self.settle(platforms, FetchKind::Streams, |client| async move {
            client.get_streams(options).await
        })
        .await
    }

    pub async fn fetch_schedules(
        &self,
        platforms: &[PlatformType],
    ) -> Result<Aggregated<Schedule>, AggregateError> {
        let options = &self.fetch_options;
        self.settle(platforms, FetchKind::Schedules, |client| async move {
            client.get_schedules(options).await
        })
        .await
    }

    /// Run `fetch` for every platform, wait for all of them, then merge in
    /// request order. Fails only when every requested platform failed.
    async fn settle<T, F, Fut>(
        &self,
        platforms: &[PlatformType],
        kind: FetchKind,
        fetch: F,
    ) -> Result<Aggregated<T>, AggregateError>
    where
        T: Keyed,
        F: Fn(Arc<dyn PlatformClient>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, PlatformError>>,
    {
        let fetch = &fetch;
        let calls = platforms.iter().map(|&platform| {
            let client = self.client(platform);
            async move {
                let result = match client {
                    Some(client) => tokio::time::timeout(self.timeout, fetch(client))
                        .await
                        .unwrap_or(Err(PlatformError::Timeout)),
                    None => Err(PlatformError::NotConfigured(format!(
                        "no client registered for {platform}"
                    ))),
                };
                (platform, result)
            }
        });

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (platform, result) in join_all(calls).await {
            match result {
                Ok(fetched) => {
                    tracing::debug!(%platform, %kind, count = fetched.len(), "Platform fetch succeeded");
                    items.extend(fetched);
                }
                Err(error) => {
                    let record = self.errors.record_platform(platform.as_str(), &error);
                    failures.push(PlatformFailure {
                        platform,
                        error,
                        record,
                    });
                }
            }
        }

        if !platforms.is_empty() && failures.len() == platforms.len() {
            return Err(AggregateError::AllFailed { kind, failures });
        }

        tracing::info!(
            %kind,
            platforms = platforms.len(),
            failed = failures.len(),
            count = items.len(),
            "Aggregated platform results"
        );
        Ok(Aggregated {
            items: dedupe_by_key(items),
            failures,
        })
    }
}
