// ABOUTME: Endpoint and client configuration for a generic OAuth 2.0 provider
// ABOUTME: Built from the provider catalog plus client credentials from the environment

use url::Url;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub provider: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub device_auth_url: Option<String>,
    pub revoke_url: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Provider-specific authorization URL parameters (e.g. `access_type=offline`)
    pub extra_auth_params: Vec<(String, String)>,
    pub supports_refresh: bool,
}

impl OAuthClientConfig {
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// Authorization URL carrying the PKCE challenge and CSRF state
    pub fn authorization_url(&self, code_challenge: &str, state: &str) -> AuthResult<String> {
        let mut url = Url::parse(&self.auth_url).map_err(|e| {
            AuthError::Configuration(format!("Invalid auth URL for {}: {}", self.provider, e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "S256")
                .append_pair("state", state);

            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scope_param());
            }
            for (key, value) in &self.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> OAuthClientConfig {
        OAuthClientConfig {
            provider: "google".to_string(),
            client_id: "client-123".to_string(),
            client_secret: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            device_auth_url: None,
            revoke_url: None,
            redirect_uri: "http://localhost:3737/auth/callback".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            extra_auth_params: vec![("access_type".to_string(), "offline".to_string())],
            supports_refresh: true,
        }
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = config().authorization_url("challenge-abc", "state-xyz").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "http://localhost:3737/auth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["code_challenge"], "challenge-abc");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], "state-xyz");
        assert_eq!(params["scope"], "openid email");
        assert_eq!(params["access_type"], "offline");
    }

    #[test]
    fn test_empty_scopes_are_omitted() {
        let config = OAuthClientConfig {
            scopes: Vec::new(),
            ..config()
        };
        let url = config.authorization_url("c", "s").unwrap();
        assert!(!url.contains("scope="));
    }

    #[test]
    fn test_invalid_auth_url() {
        let config = OAuthClientConfig {
            auth_url: "not a url".to_string(),
            ..config()
        };
        assert!(matches!(
            config.authorization_url("c", "s"),
            Err(AuthError::Configuration(_))
        ));
    }
}
