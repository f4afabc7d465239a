//! REST API handlers grouped by domain.

pub mod auth;
pub mod config;
pub mod errors;
pub mod logs;
pub mod notifications;
pub mod watch;

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};
use watch_core::{ServiceError, SettingsError};

pub type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Standard success response.
pub fn ok_json(data: Value) -> Json<Value> {
    Json(json!({ "status": "ok", "data": data }))
}

/// Standard error response.
pub fn err_json(status: u16, message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "status": "error", "error": message })),
    )
}

/// Validation problems are the caller's fault; storage problems are ours.
pub fn map_service_error(err: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        ServiceError::Settings(SettingsError::Invalid { .. }) => 400,
        ServiceError::UnknownDataType(_) => 404,
        ServiceError::Settings(SettingsError::Store(_)) | ServiceError::Store(_) => 500,
    };
    if status >= 500 {
        tracing::error!("Request failed: {err}");
    }
    err_json(status, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_core::StoreError;

    #[test]
    fn invalid_settings_map_to_400() {
        let (status, body) = map_service_error(ServiceError::Settings(SettingsError::Invalid {
            field: "reminderTime",
            reason: "must be between 1 and 1440".into(),
        }));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["status"], "error");
        assert!(body.0["error"].as_str().unwrap().contains("reminderTime"));
    }

    #[test]
    fn unknown_data_type_maps_to_404() {
        let (status, _) = map_service_error(ServiceError::UnknownDataType("videos".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failures_map_to_500() {
        let (status, _) =
            map_service_error(ServiceError::Store(StoreError::Unavailable("closed".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn err_json_falls_back_on_invalid_status() {
        let (status, _) = err_json(42, "odd");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
