// ABOUTME: OAuth device authorization grant (RFC 8628) provider plug-in
// ABOUTME: Polls the token endpoint honoring authorization_pending, slow_down, and expiry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    oauth::{
        client::{OAuthErrorBody, TokenEndpointClient},
        prompt::{FlowPrompt, PromptHandler},
    },
    provider::AuthProvider,
    types::{AuthGrant, ProviderCapabilities},
};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_INTERVAL_SECS: u64 = 5;
/// Added to the polling interval on every `slow_down`
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Device authorization response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Seconds until the device code expires
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

/// Outcome of one poll of the token endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum DevicePollResponse {
    Pending,
    SlowDown,
    Granted(AuthGrant),
    Denied,
    Expired,
    Failed(String),
}

impl DevicePollResponse {
    fn from_error_code(code: &str) -> Self {
        match code {
            "authorization_pending" => Self::Pending,
            "slow_down" => Self::SlowDown,
            "access_denied" => Self::Denied,
            "expired_token" => Self::Expired,
            other => Self::Failed(other.to_string()),
        }
    }
}

#[async_trait]
pub trait DeviceFlowClient: Send + Sync {
    async fn request_device_code(&self) -> AuthResult<DeviceAuthorization>;

    async fn poll_token(&self, device_code: &str) -> AuthResult<DevicePollResponse>;
}

/// A zero interval would poll back to back, so it falls back to the default
fn polling_interval(secs: u64) -> Duration {
    match secs {
        0 => Duration::from_secs(DEFAULT_INTERVAL_SECS),
        secs => Duration::from_secs(secs),
    }
}

/// Poll until the user approves, denies, or the device code expires
pub async fn poll_for_grant(
    client: &dyn DeviceFlowClient,
    provider: &str,
    authorization: &DeviceAuthorization,
) -> AuthResult<AuthGrant> {
    let deadline = Instant::now()
        .checked_add(Duration::from_secs(authorization.expires_in))
        .ok_or_else(|| {
            AuthError::OAuthFailed(format!(
                "{} device code lifetime of {}s is out of range",
                provider, authorization.expires_in
            ))
        })?;
    let mut interval = polling_interval(authorization.interval);

    loop {
        tokio::time::sleep(interval).await;
        if Instant::now() >= deadline {
            warn!("Device code for {} expired before approval", provider);
            return Err(AuthError::Timeout(format!("{} device authorization", provider)));
        }

        match client.poll_token(&authorization.device_code).await? {
            DevicePollResponse::Pending => {
                debug!("Authorization pending for {}", provider);
            }
            DevicePollResponse::SlowDown => {
                interval = interval.saturating_add(SLOW_DOWN_INCREMENT);
                debug!(
                    "Slowing down {} polling to every {}s",
                    provider,
                    interval.as_secs()
                );
            }
            DevicePollResponse::Granted(grant) => {
                info!("Device authorization approved for {}", provider);
                return Ok(grant);
            }
            DevicePollResponse::Denied => {
                return Err(AuthError::AccessDenied(provider.to_string()));
            }
            DevicePollResponse::Expired => {
                return Err(AuthError::Timeout(format!("{} device authorization", provider)));
            }
            DevicePollResponse::Failed(code) => {
                return Err(AuthError::OAuthFailed(format!(
                    "{} device authorization failed: {}",
                    provider, code
                )));
            }
        }
    }
}

pub struct DeviceFlowProvider {
    name: String,
    device: Arc<dyn DeviceFlowClient>,
    tokens: Option<TokenEndpointClient>,
    prompt: PromptHandler,
}

impl DeviceFlowProvider {
    pub fn new(name: impl Into<String>, device: Arc<dyn DeviceFlowClient>, prompt: PromptHandler) -> Self {
        Self {
            name: name.into(),
            device,
            tokens: None,
            prompt,
        }
    }

    /// Token endpoint used for refresh and revocation
    pub fn with_token_client(mut self, tokens: TokenEndpointClient) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

#[async_trait]
impl AuthProvider for DeviceFlowProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        let config = self.tokens.as_ref().map(TokenEndpointClient::config);
        ProviderCapabilities {
            supports_refresh: config.is_some_and(|c| c.supports_refresh),
            supports_revoke: config.is_some_and(|c| c.revoke_url.is_some()),
            supports_device_flow: true,
            supports_local_token: false,
        }
    }

    async fn start_auth(&self) -> AuthResult<AuthGrant> {
        let authorization = self.device.request_device_code().await?;

        (self.prompt)(&FlowPrompt::EnterCode {
            provider: self.name.clone(),
            verification_uri: authorization
                .verification_uri_complete
                .clone()
                .unwrap_or_else(|| authorization.verification_uri.clone()),
            user_code: authorization.user_code.clone(),
        });

        poll_for_grant(self.device.as_ref(), &self.name, &authorization).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> AuthResult<AuthGrant> {
        match &self.tokens {
            Some(tokens) if tokens.config().supports_refresh => tokens.refresh(refresh_token).await,
            _ => Err(AuthError::unsupported(&self.name, "refresh")),
        }
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<()> {
        match &self.tokens {
            Some(tokens) => tokens.revoke(token).await,
            None => Err(AuthError::unsupported(&self.name, "revoke")),
        }
    }
}

/// Device flow over HTTP using the provider's configured endpoints
pub struct HttpDeviceFlowClient {
    tokens: TokenEndpointClient,
}

impl HttpDeviceFlowClient {
    pub fn new(tokens: TokenEndpointClient) -> AuthResult<Self> {
        if tokens.config().device_auth_url.is_none() {
            return Err(AuthError::Configuration(format!(
                "{} has no device authorization endpoint",
                tokens.config().provider
            )));
        }
        Ok(Self { tokens })
    }
}

#[async_trait]
impl DeviceFlowClient for HttpDeviceFlowClient {
    async fn request_device_code(&self) -> AuthResult<DeviceAuthorization> {
        let config = self.tokens.config();
        let url = config.device_auth_url.as_deref().ok_or_else(|| {
            AuthError::Configuration(format!(
                "{} has no device authorization endpoint",
                config.provider
            ))
        })?;

        let scope = config.scope_param();
        let response = self
            .tokens
            .http()
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("client_id", config.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::OAuthFailed(format!(
                "Device code request for {} failed with status {}",
                config.provider, status
            )));
        }

        Ok(response.json().await?)
    }

    async fn poll_token(&self, device_code: &str) -> AuthResult<DevicePollResponse> {
        let config = self.tokens.config();
        let mut form = vec![
            ("grant_type", DEVICE_CODE_GRANT),
            ("device_code", device_code),
            ("client_id", config.client_id.as_str()),
        ];
        if let Some(secret) = &config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .tokens
            .http()
            .post(&config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;
        let body = response.text().await?;

        Ok(parse_poll_body(&body))
    }
}

/// Pending and error states arrive as an RFC 6749 error body, with either
/// a 400 or (GitHub) a 200 status
fn parse_poll_body(body: &str) -> DevicePollResponse {
    if let Ok(error) = serde_json::from_str::<OAuthErrorBody>(body) {
        return DevicePollResponse::from_error_code(&error.error);
    }

    match serde_json::from_str::<AuthGrant>(body) {
        Ok(grant) if grant.has_access_token() => DevicePollResponse::Granted(grant),
        Ok(_) => DevicePollResponse::Failed("missing access_token".to_string()),
        Err(e) => DevicePollResponse::Failed(format!("unreadable token response: {}", e)),
    }
}
