// ABOUTME: Error types for provider flows, token lifecycle, and persistence
// ABOUTME: Separates lookup, flow, capability, state, and persistence failures

use std::sync::Arc;

use switchboard_storage::StorageError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    // Lookup
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    // Flow
    #[error("Authentication cancelled for {0}")]
    Cancelled(String),

    #[error("Access denied by {0}")]
    AccessDenied(String),

    #[error("OAuth authentication failed: {0}")]
    OAuthFailed(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("State mismatch: CSRF protection failed")]
    StateMismatch,

    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[error("Failed to open browser: {0}")]
    BrowserOpen(String),

    #[error("Provider {0} returned no access token")]
    MissingAccessToken(String),

    #[error("PKCE error: {0}")]
    Pkce(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Capability
    #[error("Provider {provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("Provider {0} uses local tokens; add one with add_local_token instead")]
    LocalTokenRequired(String),

    #[error("No refresh token stored for {0}")]
    RefreshUnavailable(String),

    /// A coalesced refresh failed; every waiting caller sees the same cause
    #[error("Token refresh failed for {provider}: {source}")]
    RefreshFailed {
        provider: String,
        #[source]
        source: Arc<AuthError>,
    },

    // State
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("No connection profile exists")]
    NoProfile,

    // Persistence
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    pub fn unsupported(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            operation,
        }
    }

    /// True when the provider can never perform the operation, as opposed
    /// to a transient or user-driven failure
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            Self::Unsupported { .. } | Self::LocalTokenRequired(_) | Self::RefreshUnavailable(_)
        )
    }
}
