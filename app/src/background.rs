//! Background task loops: the poll scheduler and core event forwarding.

use tokio::sync::broadcast::error::RecvError;
use watch_core::CoreEvent;

use crate::app::SharedState;

/// Run the poll scheduler until shutdown.
pub async fn watch_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    state.service().scheduler().run(shutdown_token).await;
    tracing::info!("Watch loop stopped (shutdown)");
}

/// Forward every core event to WebSocket clients as `{type, data}` JSON.
pub async fn event_forward_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    let mut rx = state.service().events().subscribe();

    loop {
        let event = tokio::select! {
            _ = shutdown_token.cancelled() => {
                tracing::info!("Event forward loop stopped (shutdown)");
                return;
            }
            received = rx.recv() => received,
        };

        match event {
            Ok(event) => forward(&state, &event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event forwarder lagged behind");
            }
            Err(RecvError::Closed) => {
                tracing::info!("Event bus closed");
                return;
            }
        }
    }
}

fn forward(state: &SharedState, event: &CoreEvent) {
    match serde_json::to_string(event) {
        Ok(text) => {
            let _ = state.ws_sender().send(text);
        }
        Err(e) => tracing::warn!("Failed to serialize event: {e}"),
    }
}
