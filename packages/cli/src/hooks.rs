// ABOUTME: Post-login hooks installed by the command line front end
// ABOUTME: Logs a summary of each new connection

use async_trait::async_trait;
use tracing::info;

use switchboard_auth::{PostLoginHook, TokenRecord};

/// Logs the granted scopes and lifetime of a new connection
pub struct LoginSummaryHook;

#[async_trait]
impl PostLoginHook for LoginSummaryHook {
    fn name(&self) -> &str {
        "login summary"
    }

    async fn after_login(&self, provider: &str, token: &TokenRecord) -> anyhow::Result<()> {
        let scopes = token
            .scopes
            .as_ref()
            .filter(|scopes| !scopes.is_empty())
            .map(|scopes| scopes.join(" "))
            .unwrap_or_else(|| "default".to_string());

        match token.expires_at {
            Some(expires_at) => info!(
                "Connected {} (scopes: {}, expires {})",
                provider,
                scopes,
                expires_at.to_rfc3339()
            ),
            None => info!("Connected {} (scopes: {}, no expiry)", provider, scopes),
        }
        Ok(())
    }
}
