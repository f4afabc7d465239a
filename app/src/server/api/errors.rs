//! Error history API.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::app::SharedState;

use super::{ApiResult, ok_json};

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub limit: Option<usize>,
}

/// GET /api/errors
pub async fn get_errors(State(state): State<SharedState>, Query(q): Query<ErrorQuery>) -> ApiResult {
    let errors = match q.limit {
        Some(limit) => state.service().errors().recent(limit),
        None => state.service().errors().all(),
    };
    Ok(ok_json(json!({ "errors": errors, "count": errors.len() })))
}

/// DELETE /api/errors
pub async fn clear_errors(State(state): State<SharedState>) -> ApiResult {
    let cleared = state.service().errors().clear();
    Ok(ok_json(json!({ "cleared": cleared })))
}
