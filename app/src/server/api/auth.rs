//! Platform credential API:
//!   POST /api/auth/{platformType} – validate, store and adopt a new token

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use platform_client::PlatformType;
use serde_json::{Value, json};

use crate::app::SharedState;
use crate::services::credentials::{self, AuthRequest, CredentialError};

use super::{ApiResult, err_json, ok_json};

/// POST /api/auth/{platformType}
pub async fn authenticate(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Json(body): Json<AuthRequest>,
) -> ApiResult {
    let platform = platform
        .parse::<PlatformType>()
        .map_err(|_| err_json(404, &format!("unknown platform: {platform}")))?;

    let config = state.config().await.clone();
    let result = credentials::authenticate(state.service(), &config, state.db(), platform, body)
        .await
        .map_err(map_credential_error)?;
    Ok(ok_json(json!(result)))
}

fn map_credential_error(err: CredentialError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        CredentialError::UnknownPlatform(_) => 404,
        CredentialError::Empty => 400,
        CredentialError::Platform(e) if e.is_auth() => 401,
        CredentialError::Platform(_) => 502,
        CredentialError::Db(_) => 500,
    };
    tracing::warn!("Authentication failed: {err}");
    err_json(status, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::PlatformError;

    #[test]
    fn rejected_token_maps_to_401() {
        let (status, body) = map_credential_error(CredentialError::Platform(
            PlatformError::Unauthorized("invalid token".into()),
        ));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.0["status"], "error");
    }

    #[test]
    fn upstream_failure_maps_to_502() {
        let (status, _) = map_credential_error(CredentialError::Platform(PlatformError::Timeout));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn empty_token_maps_to_400() {
        let (status, _) = map_credential_error(CredentialError::Empty);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
