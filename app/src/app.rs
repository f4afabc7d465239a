use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use watch_core::{EventBus, Store, WatchService};
use watch_db::Database;

use crate::config::{AppConfig, SettingsManager};
use crate::services::credentials;
use crate::services::notifier::WsNotifier;

const WS_CHANNEL_CAPACITY: usize = 2048;

/// Application shared state accessible from axum handlers and background loops.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Broadcast channel for WebSocket messages
    ws_tx: broadcast::Sender<String>,
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    db: Database,
    data_dir: PathBuf,
    service: WatchService,
    notifier: Arc<WsNotifier>,
    shutdown_token: CancellationToken,
}

impl SharedState {
    /// Build the platform clients and start the watch service on top of an
    /// already-opened database and loaded config.
    pub async fn new(
        db: Database,
        config: AppConfig,
        data_dir: PathBuf,
    ) -> Result<Self, anyhow::Error> {
        let (ws_tx, _) = broadcast::channel(WS_CHANNEL_CAPACITY);
        let notifier = Arc::new(WsNotifier::new(ws_tx.clone()));

        let clients = credentials::build_clients(&config, &db).await;
        let store: Arc<dyn Store> = Arc::new(db.clone());
        let service = WatchService::start(store, notifier.clone(), clients, EventBus::new()).await?;

        Ok(Self {
            inner: Arc::new(SharedStateInner {
                ws_tx,
                config: RwLock::new(config),
                db,
                data_dir,
                service,
                notifier,
                shutdown_token: CancellationToken::new(),
            }),
        })
    }

    pub fn server_port(&self) -> u16 {
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(8080)
    }

    pub fn ws_sender(&self) -> &broadcast::Sender<String> {
        &self.inner.ws_tx
    }

    pub fn subscribe_ws(&self) -> broadcast::Receiver<String> {
        self.inner.ws_tx.subscribe()
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn service(&self) -> &WatchService {
        &self.inner.service
    }

    pub fn notifier(&self) -> &WsNotifier {
        &self.inner.notifier
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database and push fresh credentials to the
    /// platform clients.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        credentials::reconfigure(&self.inner.service, &config, &self.inner.db).await;
        Ok(())
    }
}
