use std::time::Duration;

use tokio::time::sleep;

use crate::app::SharedState;

pub async fn graceful_shutdown(state: &SharedState) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    let _ = state
        .ws_sender()
        .send(serde_json::json!({ "type": "server_shutdown" }).to_string());

    sleep(Duration::from_millis(200)).await;
    tracing::info!("Shutdown sequence completed");
}
