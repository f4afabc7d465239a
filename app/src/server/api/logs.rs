//! Log viewing API backed by the in-memory capture layer.

use axum::Json;
use axum::extract::Query;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::Level;

use crate::services::log_buffer;

use super::{ApiResult, err_json};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    /// Minimum level: error, warn, info, debug or trace.
    pub level: Option<String>,
}

/// GET /api/logs
pub async fn get_logs(Query(q): Query<LogQuery>) -> ApiResult {
    let limit = q.limit.unwrap_or(100);
    let min_level = match q.level.as_deref() {
        None | Some("") => None,
        Some(level) => Some(
            level
                .parse::<Level>()
                .map_err(|_| err_json(400, &format!("unknown log level: {level}")))?,
        ),
    };

    let logs = log_buffer::recent(limit, min_level);
    Ok(Json(json!({
        "logs": logs,
        "count": logs.len(),
        "limit": limit,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// POST /api/logs/clear
pub async fn clear_logs() -> Json<Value> {
    let cleared = log_buffer::clear();
    Json(json!({ "status": "ok", "cleared": cleared }))
}
