//! Shared HTTP plumbing composed by every platform adapter.
//!
//! Applies a per-request timeout, retries once on throttling/server errors,
//! and maps HTTP status codes onto [`PlatformError`].

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::PlatformError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Thin wrapper around [`reqwest::Client`] with timeout and single-retry policy.
#[derive(Clone)]
pub struct HttpHelper {
    http: reqwest::Client,
    max_retries: u32,
}

impl Default for HttpHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHelper {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            max_retries: 1,
        }
    }

    /// GET a JSON document. Any non-success status is an error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<T, PlatformError> {
        let (status, body) = self.send_with_retry(url, headers).await?;
        let body = check_status(status, body)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET a JSON document, treating 404 as "no data".
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Option<T>, PlatformError> {
        let (status, body) = self.send_with_retry(url, headers).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = check_status(status, body)?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn send_with_retry(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<(StatusCode, String), PlatformError> {
        let mut attempt = 0;
        loop {
            let result = self.http.get(url).headers(headers.clone()).send().await;
            let retryable = match &result {
                Ok(resp) => is_retryable_status(resp.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if retryable && attempt < self.max_retries {
                attempt += 1;
                tracing::debug!(url = redact(url), attempt, "Retrying platform request");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            let resp = result.map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout
                } else {
                    PlatformError::Http(e)
                }
            })?;
            let status = resp.status();
            let body = resp.text().await?;
            return Ok((status, body));
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Map an HTTP status onto the crate error type, passing successful bodies through.
pub(crate) fn check_status(status: StatusCode, body: String) -> Result<String, PlatformError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(PlatformError::Unauthorized(body));
    }
    if !status.is_success() {
        return Err(PlatformError::ApiError {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(body)
}

/// Build `Authorization: <scheme> <token>` plus JSON accept headers.
pub fn auth_headers(scheme: &str, token: &str) -> Result<HeaderMap, PlatformError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("{scheme} {token}"))?,
    );
    Ok(headers)
}

// Keeps API keys out of the logs.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
