//! Streaming platform client library.
//!
//! Provides the shared stream/schedule models, the [`PlatformClient`]
//! capability trait, and thin REST adapters for Twitch, YouTube and
//! TwitCasting. Retry and timeout handling lives in [`request::HttpHelper`],
//! which every adapter composes.

pub mod models;
pub mod request;
pub mod twitcasting;
pub mod twitch;
pub mod youtube;

use std::sync::Arc;

use async_trait::async_trait;

pub use models::{
    AuthResult, ClientOptions, FetchOptions, IdentityKey, PlatformType, Schedule, Stream,
};
pub use twitcasting::TwitCastingClient;
pub use twitch::TwitchClient;
pub use youtube::YouTubeClient;

/// Unified error type for the platform-client crate.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: no valid token")]
    AuthRequired,

    #[error("Token rejected by platform: {0}")]
    Unauthorized(String),

    #[error("Platform API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Capability not supported: {0}")]
    Unsupported(&'static str),

    #[error("Client not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PlatformError {
    /// Whether the error means the stored credentials are missing or no longer valid.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PlatformError::AuthRequired | PlatformError::Unauthorized(_)
        )
    }
}

/// Capability interface implemented independently by each platform adapter.
///
/// `get_schedules` and `authenticate` are optional: the default
/// implementations report [`PlatformError::Unsupported`], which callers treat
/// as a capability gap rather than a crash.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> PlatformType;

    /// Replace the client's credentials and channel configuration.
    async fn initialize(&self, options: ClientOptions) -> Result<(), PlatformError>;

    async fn get_streams(&self, options: &FetchOptions) -> Result<Vec<Stream>, PlatformError>;

    fn supports_schedules(&self) -> bool {
        false
    }

    async fn get_schedules(&self, _options: &FetchOptions) -> Result<Vec<Schedule>, PlatformError> {
        Err(PlatformError::Unsupported("schedules"))
    }

    /// Validate the given credentials against the platform and adopt them on success.
    async fn authenticate(&self, _options: &ClientOptions) -> Result<AuthResult, PlatformError> {
        Err(PlatformError::Unsupported("authenticate"))
    }
}

/// Build the default adapter for a platform.
pub fn client_for(platform: PlatformType) -> Arc<dyn PlatformClient> {
    match platform {
        PlatformType::Twitch => Arc::new(TwitchClient::new()),
        PlatformType::YouTube => Arc::new(YouTubeClient::new()),
        PlatformType::TwitCasting => Arc::new(TwitCastingClient::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_classified() {
        assert!(PlatformError::AuthRequired.is_auth());
        assert!(PlatformError::Unauthorized("expired".into()).is_auth());
        assert!(
            !PlatformError::ApiError {
                status: 500,
                message: "boom".into()
            }
            .is_auth()
        );
        assert!(!PlatformError::Timeout.is_auth());
    }

    #[test]
    fn default_clients_match_platform() {
        for platform in PlatformType::ALL {
            assert_eq!(client_for(platform).platform(), platform);
        }
    }

    #[test]
    fn only_twitch_and_youtube_support_schedules() {
        assert!(client_for(PlatformType::Twitch).supports_schedules());
        assert!(client_for(PlatformType::YouTube).supports_schedules());
        assert!(!client_for(PlatformType::TwitCasting).supports_schedules());
    }
}
