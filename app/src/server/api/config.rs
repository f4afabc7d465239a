//! Process configuration API:
//!   GET /api/config – all settings (secrets masked) + platform status
//!   PUT /api/config – update settings and reconfigure platform clients

use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::app::SharedState;
use crate::config::SettingsManager;
use crate::config::defaults::DEFAULT_SETTINGS;
use crate::config::validation::validate_setting;

use super::{ApiResult, err_json};

/// GET /api/config
pub async fn get_config(State(state): State<SharedState>) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    Ok(Json(snapshot(&sm)?))
}

/// PUT /api/config
pub async fn update_config(
    State(state): State<SharedState>,
    Json(body): Json<HashMap<String, String>>,
) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());

    // Reject the whole update before writing anything.
    for (key, value) in &body {
        if !DEFAULT_SETTINGS.contains_key(key.as_str()) {
            return Err(err_json(400, &format!("unknown setting key: {key}")));
        }
        validate_setting(key, value).map_err(|e| err_json(400, &format!("{key}: {e}")))?;
    }
    for (key, value) in &body {
        sm.set_setting(key, value)
            .map_err(|e| err_json(400, &format!("{key}: {e}")))?;
    }

    state
        .reload_config()
        .await
        .map_err(|e| err_json(500, &format!("Failed to reload config: {e}")))?;

    let mut response = snapshot(&sm)?;
    response["updated"] = json!(body.len());
    response["restartRequired"] = json!(body.contains_key("SERVER_PORT"));
    Ok(Json(response))
}

fn snapshot(sm: &SettingsManager) -> Result<Value, (axum::http::StatusCode, Json<Value>)> {
    let settings = sm
        .get_all_settings()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    let status = sm
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;
    Ok(json!({
        "status": "ok",
        "settings": settings,
        "features": status,
    }))
}
