//! Notification sink that shows notifications on connected WebSocket clients.
//!
//! Each create/clear is broadcast as `notification_created` /
//! `notification_cleared`; the set of live notifications is kept so a client
//! that connects later can be brought up to date. Only the newest
//! [`MAX_ACTIVE_NOTIFICATIONS`] are kept; older ones are cleared.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use watch_core::{NotificationOptions, NotificationSink, SinkError};

pub const MAX_ACTIVE_NOTIFICATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveNotification {
    pub id: String,
    #[serde(flatten)]
    pub options: NotificationOptions,
    pub created_at: String,
}

pub struct WsNotifier {
    ws_tx: broadcast::Sender<String>,
    /// Oldest first.
    active: Mutex<VecDeque<ActiveNotification>>,
}

impl WsNotifier {
    pub fn new(ws_tx: broadcast::Sender<String>) -> Self {
        Self {
            ws_tx,
            active: Mutex::new(VecDeque::new()),
        }
    }

    /// Notifications shown and not yet cleared, oldest first.
    pub fn active(&self) -> Vec<ActiveNotification> {
        self.active
            .lock()
            .map(|active| active.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn cleared(&self, id: &str) {
        self.broadcast(json!({ "type": "notification_cleared", "data": { "id": id } }));
    }

    fn broadcast(&self, message: serde_json::Value) {
        // No connected client is fine; the notification stays in `active`.
        let _ = self.ws_tx.send(message.to_string());
    }
}

#[async_trait]
impl NotificationSink for WsNotifier {
    async fn create(&self, id: &str, options: &NotificationOptions) -> Result<String, SinkError> {
        if options.title.is_empty() {
            return Err(SinkError::Rejected(format!("{id}: empty title")));
        }

        let notification = ActiveNotification {
            id: id.to_string(),
            options: options.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let message = json!({ "type": "notification_created", "data": &notification });

        let evicted: Vec<ActiveNotification> = {
            let mut active = self
                .active
                .lock()
                .map_err(|_| SinkError::Unavailable("notification state poisoned".into()))?;
            active.retain(|n| n.id != id);
            active.push_back(notification);
            let overflow = active.len().saturating_sub(MAX_ACTIVE_NOTIFICATIONS);
            active.drain(..overflow).collect()
        };
        self.broadcast(message);
        for old in &evicted {
            tracing::debug!(id = %old.id, "Evicting oldest notification");
            self.cleared(&old.id);
        }

        tracing::debug!(id, "Notification shown");
        Ok(id.to_string())
    }

    async fn clear(&self, id: &str) -> Result<bool, SinkError> {
        let removed = {
            let mut active = self
                .active
                .lock()
                .map_err(|_| SinkError::Unavailable("notification state poisoned".into()))?;
            let before = active.len();
            active.retain(|n| n.id != id);
            active.len() != before
        };
        if removed {
            self.cleared(id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(title: &str) -> NotificationOptions {
        NotificationOptions {
            title: title.to_string(),
            message: "is live".to_string(),
            buttons: vec!["Open".to_string()],
            ..NotificationOptions::default()
        }
    }

    #[tokio::test]
    async fn create_broadcasts_and_tracks() {
        let (tx, mut rx) = broadcast::channel(16);
        let notifier = WsNotifier::new(tx);

        let id = notifier
            .create("stream_twitch_1", &options("alice"))
            .await
            .unwrap();
        assert_eq!(id, "stream_twitch_1");

        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "notification_created");
        assert_eq!(msg["data"]["id"], "stream_twitch_1");
        assert_eq!(msg["data"]["title"], "alice");
        assert_eq!(msg["data"]["buttons"][0], "Open");

        assert_eq!(notifier.active().len(), 1);
    }

    #[tokio::test]
    async fn create_same_id_replaces() {
        let (tx, _rx) = broadcast::channel(16);
        let notifier = WsNotifier::new(tx);

        notifier.create("custom_1", &options("first")).await.unwrap();
        notifier.create("custom_1", &options("second")).await.unwrap();

        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].options.title, "second");
    }

    #[tokio::test]
    async fn oldest_notifications_are_evicted_past_the_cap() {
        let (tx, mut rx) = broadcast::channel(512);
        let notifier = WsNotifier::new(tx);

        for n in 0..=MAX_ACTIVE_NOTIFICATIONS {
            notifier
                .create(&format!("custom_{n}"), &options("hello"))
                .await
                .unwrap();
        }

        let active = notifier.active();
        assert_eq!(active.len(), MAX_ACTIVE_NOTIFICATIONS);
        assert_eq!(active[0].id, "custom_1");
        assert_eq!(active[MAX_ACTIVE_NOTIFICATIONS - 1].id, "custom_100");

        let mut cleared = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let msg: serde_json::Value = serde_json::from_str(&raw).unwrap();
            if msg["type"] == "notification_cleared" {
                cleared.push(msg["data"]["id"].as_str().unwrap().to_string());
            }
        }
        assert_eq!(cleared, vec!["custom_0"]);
    }

    #[tokio::test]
    async fn create_without_clients_still_succeeds() {
        let (tx, rx) = broadcast::channel(16);
        drop(rx);
        let notifier = WsNotifier::new(tx);

        assert!(notifier.create("custom_2", &options("x")).await.is_ok());
        assert!(notifier.create("custom_3", &options("")).await.is_err());
    }

    #[tokio::test]
    async fn clear_reports_whether_it_existed() {
        let (tx, mut rx) = broadcast::channel(16);
        let notifier = WsNotifier::new(tx);
        notifier.create("error_1", &options("oops")).await.unwrap();
        let _ = rx.recv().await;

        assert!(notifier.clear("error_1").await.unwrap());
        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "notification_cleared");
        assert_eq!(msg["data"]["id"], "error_1");

        assert!(!notifier.clear("error_1").await.unwrap());
        assert!(notifier.active().is_empty());
    }
}
