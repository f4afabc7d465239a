//! Platform credentials: merges configured settings with stored tokens and
//! (re)initializes the registered adapters.

use std::sync::Arc;

use platform_client::{AuthResult, ClientOptions, PlatformClient, PlatformError, PlatformType};
use serde::Deserialize;
use watch_core::WatchService;
use watch_db::tokens::Token;
use watch_db::{Database, DbError};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No client registered for {0}")]
    UnknownPlatform(PlatformType),

    #[error("Credential is empty")]
    Empty,

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Failed to store token: {0}")]
    Db(#[from] DbError),
}

/// Body of `POST /api/auth/{platformType}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// OAuth access token (Twitch, TwitCasting) or API key (YouTube).
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// YouTube authenticates with an API key, the others with a bearer token.
fn set_secret(options: &mut ClientOptions, platform: PlatformType, secret: String) {
    match platform {
        PlatformType::YouTube => options.api_key = Some(secret),
        PlatformType::Twitch | PlatformType::TwitCasting => options.access_token = Some(secret),
    }
}

/// Adapter options for `platform`: configured settings, with the most recent
/// stored token taking precedence.
pub fn client_options(config: &AppConfig, db: &Database, platform: PlatformType) -> ClientOptions {
    let mut options = config.client_options(platform);
    match db.get_latest_token(platform.as_str()) {
        Ok(Some(token)) => {
            if !token.access_token.is_empty() {
                set_secret(&mut options, platform, token.access_token);
            }
            if options.user_id.is_none() && !token.user_id.is_empty() {
                options.user_id = Some(token.user_id);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(%platform, "Failed to read stored token: {e}"),
    }
    options
}

/// One adapter per platform, initialized from config and stored tokens.
pub async fn build_clients(config: &AppConfig, db: &Database) -> Vec<Arc<dyn PlatformClient>> {
    let mut clients = Vec::with_capacity(PlatformType::ALL.len());
    for platform in PlatformType::ALL {
        let client = platform_client::client_for(platform);
        configure(client.as_ref(), client_options(config, db, platform)).await;
        clients.push(client);
    }
    clients
}

/// Re-apply config and stored tokens to every registered adapter.
pub async fn reconfigure(service: &WatchService, config: &AppConfig, db: &Database) {
    for platform in PlatformType::ALL {
        if let Some(client) = service.aggregator().client(platform) {
            configure(client.as_ref(), client_options(config, db, platform)).await;
        }
    }
}

async fn configure(client: &dyn PlatformClient, options: ClientOptions) {
    let platform = client.platform();
    match client.initialize(options).await {
        Ok(()) => tracing::debug!(%platform, "Platform client configured"),
        Err(e) => tracing::warn!(%platform, "Failed to configure platform client: {e}"),
    }
}

/// Validate and adopt a new credential, persist it, and tell the core that
/// `platform` may be polled again.
pub async fn authenticate(
    service: &WatchService,
    config: &AppConfig,
    db: &Database,
    platform: PlatformType,
    request: AuthRequest,
) -> Result<AuthResult, CredentialError> {
    let secret = request.access_token.trim().to_string();
    if secret.is_empty() {
        return Err(CredentialError::Empty);
    }
    let client = service
        .aggregator()
        .client(platform)
        .ok_or(CredentialError::UnknownPlatform(platform))?;

    let mut options = client_options(config, db, platform);
    set_secret(&mut options, platform, secret.clone());
    if let Some(user_id) = request.user_id.clone().filter(|id| !id.is_empty()) {
        options.user_id = Some(user_id);
    }

    let result = match client.authenticate(&options).await {
        Ok(result) => result,
        Err(PlatformError::Unsupported(_)) => {
            client.initialize(options.clone()).await?;
            AuthResult {
                platform_type: platform,
                authenticated: true,
                user_id: options.user_id.clone(),
                user_name: None,
                expires_in: request.expires_in,
            }
        }
        Err(e) => {
            service.errors().record_platform(platform.as_str(), &e);
            return Err(e.into());
        }
    };

    let expires_at = result
        .expires_in
        .or(request.expires_in)
        .map(|secs| chrono::Utc::now().timestamp() + secs)
        .unwrap_or(0);
    db.save_token(&Token {
        platform: platform.as_str().to_string(),
        access_token: secret,
        refresh_token: request.refresh_token,
        scope: request.scope,
        user_id: result.user_id.clone().or(options.user_id).unwrap_or_default(),
        expires_at,
    })?;

    tracing::info!(%platform, user = ?result.user_name, "Platform credentials stored");
    service.auth_updated(platform);
    Ok(result)
}
