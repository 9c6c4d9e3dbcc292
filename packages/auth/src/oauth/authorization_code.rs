// ABOUTME: Authorization code + PKCE provider plug-in driven by the system browser
// ABOUTME: Validates CSRF state on the loopback redirect before exchanging the code

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::{
    error::{AuthError, AuthResult},
    oauth::{
        client::TokenEndpointClient,
        pkce::PkceChallenge,
        prompt::{FlowPrompt, PromptHandler},
        server::CallbackServer,
    },
    provider::AuthProvider,
    types::{AuthGrant, ProviderCapabilities},
};

/// How the interactive part of the flow is run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserFlowSettings {
    pub callback_port: u16,
    pub callback_timeout: Duration,
    /// When false the authorization URL is handed to the prompt handler instead
    pub open_browser: bool,
}

pub struct AuthorizationCodeProvider {
    client: TokenEndpointClient,
    settings: BrowserFlowSettings,
    prompt: PromptHandler,
}

impl AuthorizationCodeProvider {
    pub fn new(
        client: TokenEndpointClient,
        settings: BrowserFlowSettings,
        prompt: PromptHandler,
    ) -> Self {
        Self {
            client,
            settings,
            prompt,
        }
    }

    fn launch(&self, url: &str) -> AuthResult<()> {
        if !self.settings.open_browser {
            (self.prompt)(&FlowPrompt::VisitUrl {
                provider: self.name().to_string(),
                url: url.to_string(),
            });
            return Ok(());
        }

        info!("Opening browser for {} authorization", self.name());
        open::that(url).map_err(|e| {
            error!("Failed to open browser: {}", e);
            AuthError::BrowserOpen(format!(
                "Failed to open browser. Please manually visit: {}",
                url
            ))
        })
    }
}

#[async_trait]
impl AuthProvider for AuthorizationCodeProvider {
    fn name(&self) -> &str {
        &self.client.config().provider
    }

    fn capabilities(&self) -> ProviderCapabilities {
        let config = self.client.config();
        ProviderCapabilities {
            supports_refresh: config.supports_refresh,
            supports_revoke: config.revoke_url.is_some(),
            supports_device_flow: false,
            supports_local_token: false,
        }
    }

    async fn start_auth(&self) -> AuthResult<AuthGrant> {
        let pkce = PkceChallenge::generate()?;
        let expected_state = nanoid::nanoid!();

        let server = CallbackServer::new(self.settings.callback_port, self.settings.callback_timeout);
        let callback = server.bind().await?;

        let url = self
            .client
            .config()
            .authorization_url(&pkce.code_challenge, &expected_state)?;
        debug!("Authorization URL for {}: {}", self.name(), url);
        self.launch(&url)?;

        let params = callback.wait(self.name()).await?;
        if params.state != expected_state {
            error!("State mismatch in {} callback", self.name());
            return Err(AuthError::StateMismatch);
        }
        debug!("State validated for {}", self.name());

        self.client
            .exchange_code(&params.code, &pkce.code_verifier)
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> AuthResult<AuthGrant> {
        if !self.client.config().supports_refresh {
            return Err(AuthError::unsupported(self.name(), "refresh"));
        }
        self.client.refresh(refresh_token).await
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<()> {
        self.client.revoke(token).await
    }
}
