// ABOUTME: Provider plug-in for user-supplied long-lived tokens (e.g. Home Assistant)
// ABOUTME: Has no interactive flow; tokens are added through add_local_token

use async_trait::async_trait;

use crate::{
    error::{AuthError, AuthResult},
    provider::AuthProvider,
    types::{AuthGrant, ProviderCapabilities},
};

pub struct LocalTokenProvider {
    name: String,
}

impl LocalTokenProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl AuthProvider for LocalTokenProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_local_token: true,
            ..Default::default()
        }
    }

    async fn start_auth(&self) -> AuthResult<AuthGrant> {
        Err(AuthError::LocalTokenRequired(self.name.clone()))
    }
}
