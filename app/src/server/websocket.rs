use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use watch_core::{Request, WatchService};

use crate::app::SharedState;

const REPLY_CHANNEL_CAPACITY: usize = 64;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe_ws();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_CHANNEL_CAPACITY);

    // Send connection confirmation with the notifications already on screen
    let client_id = uuid::Uuid::new_v4().to_string();
    let welcome = json!({
        "type": "connected",
        "data": {
            "clientId": client_id,
            "notifications": state.notifier().active(),
            "badge": state.service().badge().badge(),
        }
    });
    if sender
        .send(Message::Text(welcome.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    tracing::info!("WebSocket client connected: {}", client_id);

    // Forward broadcasts and this client's replies
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client lagged behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Receive messages from this client and hand them to the service
    let cid = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = handle_client_message(text.as_str(), state.service()).await;
                    if reply_tx.send(reply.to_string()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        tracing::info!("WebSocket client disconnected: {}", cid);
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

#[derive(Debug)]
enum Incoming {
    Ping,
    Request {
        request: Request,
        request_id: Option<Value>,
    },
    Invalid {
        error: String,
        request_id: Option<Value>,
    },
}

/// Client messages share the `{"type": ...}` shape of [`Request`], plus
/// `ping` and an optional `requestId` echoed in the reply.
fn parse_client_message(text: &str) -> Incoming {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            return Incoming::Invalid {
                error: format!("invalid JSON: {e}"),
                request_id: None,
            };
        }
    };
    let request_id = value.get("requestId").cloned();

    if value.get("type").and_then(Value::as_str) == Some("ping") {
        return Incoming::Ping;
    }
    match serde_json::from_value::<Request>(value) {
        Ok(request) => Incoming::Request {
            request,
            request_id,
        },
        Err(e) => Incoming::Invalid {
            error: format!("unsupported message: {e}"),
            request_id,
        },
    }
}

async fn handle_client_message(text: &str, service: &WatchService) -> Value {
    match parse_client_message(text) {
        Incoming::Ping => json!({ "type": "pong" }),
        Incoming::Request {
            request,
            request_id,
        } => match service.handle(request).await {
            Ok(response) => json!({
                "type": "response",
                "requestId": request_id,
                "data": response,
            }),
            Err(e) => json!({
                "type": "error",
                "requestId": request_id,
                "error": e.to_string(),
            }),
        },
        Incoming::Invalid { error, request_id } => {
            tracing::debug!("Rejected WebSocket message: {error}");
            json!({ "type": "error", "requestId": request_id, "error": error })
        }
    }
}
