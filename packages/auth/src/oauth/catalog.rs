// ABOUTME: Catalog of known providers with endpoints, scopes, and flow kinds
// ABOUTME: Builds the default registry from client credentials found in the environment

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use switchboard_config::{ClientCredentials, Settings};

use crate::{
    error::{AuthError, AuthResult},
    oauth::{
        authorization_code::{AuthorizationCodeProvider, BrowserFlowSettings},
        client::TokenEndpointClient,
        config::OAuthClientConfig,
        device::{DeviceFlowProvider, HttpDeviceFlowClient},
        local::LocalTokenProvider,
        prompt::PromptHandler,
        server::callback_url_for,
    },
    provider::AuthProvider,
    registry::{normalize_provider_name, ProviderRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    AuthorizationCode,
    Device,
    LocalToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownProvider {
    Google,
    GitHub,
    Discord,
    Reddit,
    Spotify,
    Slack,
    Notion,
    Twitter,
    Instagram,
    YouTube,
    Facebook,
    HomeAssistant,
}

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

impl KnownProvider {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Google,
            Self::GitHub,
            Self::Discord,
            Self::Reddit,
            Self::Spotify,
            Self::Slack,
            Self::Notion,
            Self::Twitter,
            Self::Instagram,
            Self::YouTube,
            Self::Facebook,
            Self::HomeAssistant,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Discord => "discord",
            Self::Reddit => "reddit",
            Self::Spotify => "spotify",
            Self::Slack => "slack",
            Self::Notion => "notion",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::YouTube => "youtube",
            Self::Facebook => "facebook",
            Self::HomeAssistant => "homeassistant",
        }
    }

    pub fn flow(&self) -> FlowKind {
        match self {
            Self::GitHub => FlowKind::Device,
            Self::HomeAssistant => FlowKind::LocalToken,
            _ => FlowKind::AuthorizationCode,
        }
    }

    pub fn auth_url(&self) -> &'static str {
        match self {
            Self::Google | Self::YouTube => GOOGLE_AUTH_URL,
            Self::GitHub => "https://github.com/login/oauth/authorize",
            Self::Discord => "https://discord.com/oauth2/authorize",
            Self::Reddit => "https://www.reddit.com/api/v1/authorize",
            Self::Spotify => "https://accounts.spotify.com/authorize",
            Self::Slack => "https://slack.com/oauth/v2/authorize",
            Self::Notion => "https://api.notion.com/v1/oauth/authorize",
            Self::Twitter => "https://twitter.com/i/oauth2/authorize",
            Self::Instagram => "https://api.instagram.com/oauth/authorize",
            Self::Facebook => "https://www.facebook.com/v18.0/dialog/oauth",
            Self::HomeAssistant => "",
        }
    }

    pub fn token_url(&self) -> &'static str {
        match self {
            Self::Google | Self::YouTube => GOOGLE_TOKEN_URL,
            Self::GitHub => "https://github.com/login/oauth/access_token",
            Self::Discord => "https://discord.com/api/oauth2/token",
            Self::Reddit => "https://www.reddit.com/api/v1/access_token",
            Self::Spotify => "https://accounts.spotify.com/api/token",
            Self::Slack => "https://slack.com/api/oauth.v2.access",
            Self::Notion => "https://api.notion.com/v1/oauth/token",
            Self::Twitter => "https://api.twitter.com/2/oauth2/token",
            Self::Instagram => "https://api.instagram.com/oauth/access_token",
            Self::Facebook => "https://graph.facebook.com/v18.0/oauth/access_token",
            Self::HomeAssistant => "",
        }
    }

    pub fn device_auth_url(&self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("https://github.com/login/device/code"),
            _ => None,
        }
    }

    pub fn revoke_url(&self) -> Option<&'static str> {
        match self {
            Self::Google | Self::YouTube => Some(GOOGLE_REVOKE_URL),
            Self::Discord => Some("https://discord.com/api/oauth2/token/revoke"),
            Self::Reddit => Some("https://www.reddit.com/api/v1/revoke_token"),
            Self::Slack => Some("https://slack.com/api/auth.revoke"),
            Self::Twitter => Some("https://api.twitter.com/2/oauth2/revoke"),
            _ => None,
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Google => &["openid", "email", "profile"],
            Self::GitHub => &["read:user", "user:email"],
            Self::Discord => &["identify", "email"],
            Self::Reddit => &["identity", "read"],
            Self::Spotify => &["user-read-email", "user-read-private"],
            Self::Slack => &["channels:read", "chat:write"],
            Self::Notion => &[],
            Self::Twitter => &["tweet.read", "users.read", "offline.access"],
            Self::Instagram => &["user_profile", "user_media"],
            Self::YouTube => &["https://www.googleapis.com/auth/youtube.readonly"],
            Self::Facebook => &["public_profile", "email"],
            Self::HomeAssistant => &[],
        }
    }

    pub fn supports_refresh(&self) -> bool {
        matches!(
            self,
            Self::Google
                | Self::YouTube
                | Self::Discord
                | Self::Reddit
                | Self::Spotify
                | Self::Twitter
        )
    }

    /// Extra authorization URL parameters
    pub fn auth_url_extra_params(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            // Offline access is needed to receive a refresh token
            Self::Google | Self::YouTube => &[("access_type", "offline"), ("prompt", "consent")],
            Self::Reddit => &[("duration", "permanent")],
            Self::Notion => &[("owner", "user")],
            _ => &[],
        }
    }

    /// Prefix of the `<PREFIX>_CLIENT_ID` / `<PREFIX>_CLIENT_SECRET` variables
    pub fn env_prefix(&self) -> String {
        self.name().to_uppercase()
    }

    pub fn client_config(
        &self,
        credentials: ClientCredentials,
        redirect_uri: String,
    ) -> OAuthClientConfig {
        OAuthClientConfig {
            provider: self.name().to_string(),
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            auth_url: self.auth_url().to_string(),
            token_url: self.token_url().to_string(),
            device_auth_url: self.device_auth_url().map(str::to_string),
            revoke_url: self.revoke_url().map(str::to_string),
            redirect_uri,
            scopes: self.scopes().iter().map(|s| s.to_string()).collect(),
            extra_auth_params: self
                .auth_url_extra_params()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            supports_refresh: self.supports_refresh(),
        }
    }

    /// Build the plug-in for this provider. Returns `None` when the
    /// provider needs client credentials and none were supplied.
    pub fn build(
        &self,
        credentials: Option<ClientCredentials>,
        settings: &Settings,
        prompt: PromptHandler,
    ) -> AuthResult<Option<Arc<dyn AuthProvider>>> {
        if self.flow() == FlowKind::LocalToken {
            return Ok(Some(Arc::new(LocalTokenProvider::new(self.name()))));
        }

        let Some(credentials) = credentials else {
            return Ok(None);
        };

        let config = self.client_config(credentials, callback_url_for(settings.callback_port));
        let tokens = TokenEndpointClient::new(config, settings.http_timeout)?;

        let provider: Arc<dyn AuthProvider> = match self.flow() {
            FlowKind::Device => {
                let device = HttpDeviceFlowClient::new(tokens.clone())?;
                Arc::new(
                    DeviceFlowProvider::new(self.name(), Arc::new(device), prompt)
                        .with_token_client(tokens),
                )
            }
            _ => Arc::new(AuthorizationCodeProvider::new(
                tokens,
                BrowserFlowSettings {
                    callback_port: settings.callback_port,
                    callback_timeout: settings.callback_timeout,
                    open_browser: settings.open_browser,
                },
                prompt,
            )),
        };
        Ok(Some(provider))
    }
}

impl fmt::Display for KnownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for KnownProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        let name = normalize_provider_name(s);
        Self::all()
            .into_iter()
            .find(|provider| provider.name() == name)
            .ok_or(AuthError::UnknownProvider(name))
    }
}

/// Registry of every catalog provider that can be used with the current
/// environment
pub fn default_registry(settings: &Settings, prompt: PromptHandler) -> AuthResult<ProviderRegistry> {
    registry_from_source(settings, prompt, |key| env::var(key).ok())
}

pub fn registry_from_source<F>(
    settings: &Settings,
    prompt: PromptHandler,
    lookup: F,
) -> AuthResult<ProviderRegistry>
where
    F: Fn(&str) -> Option<String>,
{
    let mut registry = ProviderRegistry::new();

    for known in KnownProvider::all() {
        let credentials = ClientCredentials::from_source(&known.env_prefix(), &lookup);
        match known.build(credentials, settings, prompt.clone())? {
            Some(provider) => registry.register(provider),
            None => debug!(
                "Skipping {}: {}_CLIENT_ID is not set",
                known,
                known.env_prefix()
            ),
        }
    }

    info!("Registered {} provider(s)", registry.len());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::prompt::stderr_prompt;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            data_dir: PathBuf::from("/tmp/switchboard-test"),
            database_path: PathBuf::from("/tmp/switchboard-test/switchboard.db"),
            store_password: None,
            callback_port: 4242,
            callback_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(5),
            open_browser: false,
            profile_id: "local-user".to_string(),
            log_filter: None,
        }
    }

    #[test]
    fn test_catalog_has_twelve_providers_with_unique_names() {
        let names: Vec<&str> = KnownProvider::all().iter().map(|p| p.name()).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();

        assert_eq!(names.len(), 12);
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_parse_is_normalized() {
        assert_eq!("GitHub".parse::<KnownProvider>().unwrap(), KnownProvider::GitHub);
        assert_eq!(
            "Home Assistant".parse::<KnownProvider>().unwrap(),
            KnownProvider::HomeAssistant
        );
        assert!(matches!(
            "myspace".parse::<KnownProvider>(),
            Err(AuthError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_client_config_uses_callback_port() {
        let config = KnownProvider::Spotify.client_config(
            ClientCredentials {
                client_id: "sp".to_string(),
                client_secret: Some("secret".to_string()),
            },
            callback_url_for(4242),
        );

        assert_eq!(config.provider, "spotify");
        assert_eq!(config.redirect_uri, "http://localhost:4242/auth/callback");
        assert_eq!(config.scopes, vec!["user-read-email", "user-read-private"]);
        assert!(config.supports_refresh);
        assert_eq!(config.revoke_url, None);
    }

    #[test]
    fn test_registry_skips_unconfigured_providers() {
        let env: HashMap<&str, &str> = [
            ("SPOTIFY_CLIENT_ID", "sp"),
            ("GITHUB_CLIENT_ID", "gh"),
            ("GOOGLE_CLIENT_ID", "go"),
            ("GOOGLE_CLIENT_SECRET", "shh"),
        ]
        .into_iter()
        .collect();

        let registry = registry_from_source(&settings(), stderr_prompt(), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(
            registry.names(),
            vec!["github", "google", "homeassistant", "spotify"]
        );

        let github = registry.capabilities("github").unwrap();
        assert!(github.supports_device_flow);
        assert!(!github.supports_refresh);

        let google = registry.capabilities("google").unwrap();
        assert!(google.supports_refresh);
        assert!(google.supports_revoke);

        let home = registry.capabilities("homeassistant").unwrap();
        assert!(home.supports_local_token);
    }
}
