//! Notification API:
//!   GET  /api/notifications                        – notifications currently shown
//!   POST /api/notifications                        – show a custom notification
//!   POST /api/notifications/{id}/click             – body click
//!   POST /api/notifications/{id}/buttons/{index}   – button click
//!   POST /api/notifications/reset?id=              – forget notified state (all or one)

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;
use watch_core::{NotificationOptions, Request, Response};

use crate::app::SharedState;

use super::{ApiResult, err_json, map_service_error, ok_json};

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub id: Option<String>,
}

/// GET /api/notifications
pub async fn list_notifications(State(state): State<SharedState>) -> ApiResult {
    Ok(ok_json(json!(state.notifier().active())))
}

/// POST /api/notifications
pub async fn create_notification(
    State(state): State<SharedState>,
    Json(options): Json<NotificationOptions>,
) -> ApiResult {
    match state.service().dispatcher().notify_custom(options).await {
        Some(id) => Ok(ok_json(json!({ "id": id }))),
        None => Err(err_json(
            409,
            "Notification not shown (notifications disabled or sink failure)",
        )),
    }
}

/// POST /api/notifications/{id}/click
pub async fn click(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let event = state.service().dispatcher().handle_click(&id).await;
    Ok(ok_json(json!(event)))
}

/// POST /api/notifications/{id}/buttons/{index}
pub async fn button_click(
    State(state): State<SharedState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult {
    let event = state
        .service()
        .dispatcher()
        .handle_button_click(&id, index)
        .await;
    Ok(ok_json(json!(event)))
}

/// POST /api/notifications/reset
pub async fn reset(State(state): State<SharedState>, Query(q): Query<ResetQuery>) -> ApiResult {
    let id = q.id.filter(|id| !id.is_empty());
    let response = state
        .service()
        .handle(Request::ResetNotifications { id })
        .await
        .map_err(map_service_error)?;
    let cleared = match response {
        Response::Reset { cleared } => cleared,
        _ => 0,
    };
    Ok(ok_json(json!({ "cleared": cleared })))
}

#[cfg(test)]
mod tests;
