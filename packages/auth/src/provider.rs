// ABOUTME: Capability contract every provider plug-in implements
// ABOUTME: Interactive auth is required; refresh and revoke default to Unsupported

use async_trait::async_trait;

use crate::{
    error::{AuthError, AuthResult},
    types::{AuthGrant, ProviderCapabilities},
};

/// A third-party identity or service provider.
///
/// `start_auth` must fail with an explicit error on cancellation or flow
/// error and must never return a grant without an access token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Registry name; normalized before lookup
    fn name(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    async fn start_auth(&self) -> AuthResult<AuthGrant>;

    async fn refresh_token(&self, _refresh_token: &str) -> AuthResult<AuthGrant> {
        Err(AuthError::unsupported(self.name(), "refresh"))
    }

    /// Only called when `capabilities().supports_revoke` is set
    async fn revoke_token(&self, _token: &str) -> AuthResult<()> {
        Err(AuthError::unsupported(self.name(), "revoke"))
    }
}
