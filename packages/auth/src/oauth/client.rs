// ABOUTME: HTTP client for OAuth token, refresh, and revocation endpoints
// ABOUTME: Sends form-encoded requests and maps failures without leaking response bodies

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    error::{AuthError, AuthResult},
    oauth::config::OAuthClientConfig,
    types::AuthGrant,
};

/// Error body defined by RFC 6749 section 5.2
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Clone)]
pub struct TokenEndpointClient {
    http: Client,
    config: OAuthClientConfig,
}

impl TokenEndpointClient {
    pub fn new(config: OAuthClientConfig, timeout: Duration) -> AuthResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<AuthGrant> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.push_client_auth(&mut form);

        debug!("Exchanging authorization code for {}", self.config.provider);
        self.request_grant(&form, "Token exchange").await
    }

    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthGrant> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.push_client_auth(&mut form);

        debug!("Requesting token refresh for {}", self.config.provider);
        self.request_grant(&form, "Token refresh").await
    }

    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        let Some(revoke_url) = &self.config.revoke_url else {
            return Err(AuthError::unsupported(&self.config.provider, "revoke"));
        };

        let mut form = vec![("token", token)];
        self.push_client_auth(&mut form);

        let response = self.http.post(revoke_url).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            error!("Revocation for {} failed with status {}", self.config.provider, status);
            return Err(AuthError::OAuthFailed(format!(
                "Revocation failed with status {}",
                status
            )));
        }
        Ok(())
    }

    fn push_client_auth<'a>(&'a self, form: &mut Vec<(&'static str, &'a str)>) {
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
    }

    async fn request_grant(&self, form: &[(&str, &str)], action: &str) -> AuthResult<AuthGrant> {
        let response = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        parse_grant_response(response, &self.config.provider, action).await
    }
}

/// Turn a token endpoint response into a grant. Some providers (GitHub)
/// answer errors with status 200 and an `error` field.
pub(crate) async fn parse_grant_response(
    response: Response,
    provider: &str,
    action: &str,
) -> AuthResult<AuthGrant> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        // Only the status and OAuth error code are logged, never the body
        let code = serde_json::from_str::<OAuthErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| "unknown_error".to_string());
        error!("{} for {} failed with status {} ({})", action, provider, status, code);
        return Err(AuthError::TokenExchange(format!(
            "{} failed with status {} ({})",
            action, status, code
        )));
    }

    if let Ok(err) = serde_json::from_str::<OAuthErrorBody>(&body) {
        return Err(AuthError::TokenExchange(format!("{} failed: {}", action, err.error)));
    }

    let grant: AuthGrant = serde_json::from_str(&body).map_err(|e| {
        AuthError::TokenExchange(format!("Failed to parse token response: {}", e))
    })?;
    if !grant.has_access_token() {
        return Err(AuthError::MissingAccessToken(provider.to_string()));
    }
    Ok(grant)
}
