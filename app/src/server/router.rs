use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::{api, websocket};
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // --- Core ---
        .route("/status", get(status_handler))
        .route("/ws", get(websocket::ws_handler))
        // --- Watch ---
        .route("/api/refresh", post(api::watch::refresh))
        .route("/api/settings", get(api::watch::get_settings).put(api::watch::update_settings))
        .route("/api/data/{dataType}", get(api::watch::get_data))
        // --- Credentials ---
        .route("/api/auth/{platformType}", post(api::auth::authenticate))
        // --- Notifications ---
        .route("/api/notifications", get(api::notifications::list_notifications).post(api::notifications::create_notification))
        .route("/api/notifications/reset", post(api::notifications::reset))
        .route("/api/notifications/{id}/click", post(api::notifications::click))
        .route("/api/notifications/{id}/buttons/{index}", post(api::notifications::button_click))
        // --- Diagnostics ---
        .route("/api/errors", get(api::errors::get_errors).delete(api::errors::clear_errors))
        .route("/api/logs", get(api::logs::get_logs))
        .route("/api/logs/clear", post(api::logs::clear_logs))
        // --- Process config ---
        .route("/api/config", get(api::config::get_config).put(api::config::update_config))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler(State(state): State<SharedState>) -> Json<Value> {
    let service = state.service();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.server_port(),
        "dataDir": state.data_dir().display().to_string(),
        "scheduler": service.scheduler().status(),
        "badge": service.badge().badge(),
    }))
}
