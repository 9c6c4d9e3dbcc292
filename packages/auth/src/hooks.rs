// ABOUTME: Post-login hooks run after a successful interactive auth flow
// ABOUTME: Hook failures are logged and never reach the caller

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::TokenRecord;

#[async_trait]
pub trait PostLoginHook: Send + Sync {
    /// Label used in logs
    fn name(&self) -> &str {
        "post-login hook"
    }

    async fn after_login(&self, provider: &str, token: &TokenRecord) -> anyhow::Result<()>;
}

pub(crate) async fn run_post_login_hooks(
    hooks: &[Arc<dyn PostLoginHook>],
    provider: &str,
    token: &TokenRecord,
) {
    for hook in hooks {
        match hook.after_login(provider, token).await {
            Ok(()) => debug!("{} completed for {}", hook.name(), provider),
            Err(e) => warn!("{} failed for {}: {:#}", hook.name(), provider, e),
        }
    }
}
