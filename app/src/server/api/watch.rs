//! Watch API:
//!   POST /api/refresh           – forced poll
//!   GET  /api/settings          – watch settings
//!   PUT  /api/settings          – partial settings update
//!   GET  /api/data/{dataType}   – streams | schedules | settings | errors | status

use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use watch_core::{DataType, SettingsPatch};

use crate::app::SharedState;

use super::{ApiResult, map_service_error, ok_json};

/// POST /api/refresh
pub async fn refresh(State(state): State<SharedState>) -> ApiResult {
    let outcome = state.service().refresh().await;
    Ok(ok_json(json!(outcome)))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    Ok(ok_json(json!(state.service().settings())))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult {
    let settings = state
        .service()
        .update_settings(&patch)
        .await
        .map_err(map_service_error)?;
    Ok(ok_json(json!(settings)))
}

/// GET /api/data/{dataType}
pub async fn get_data(
    State(state): State<SharedState>,
    Path(data_type): Path<String>,
) -> ApiResult {
    let data_type = data_type
        .parse::<DataType>()
        .map_err(map_service_error)?;
    let data = state
        .service()
        .get_data(data_type)
        .await
        .map_err(map_service_error)?;
    Ok(ok_json(data))
}
