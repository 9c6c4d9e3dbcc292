// ABOUTME: Auth orchestrator coordinating providers, token vault, profile, and events
// ABOUTME: Public operations are best-effort sentinels over inspectable try_* methods

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    events::{AuthEvent, AuthEventKind, EventBus, SubscriptionId},
    hooks::{run_post_login_hooks, PostLoginHook},
    profile::ProfileStore,
    provider::AuthProvider,
    refresh::{ProviderLocks, SingleFlight},
    registry::{normalize_provider_name, ProviderRegistry},
    types::{Metadata, ProviderStatus, TokenRecord},
    vault::TokenVault,
};

type RefreshOutcome = Result<TokenRecord, Arc<AuthError>>;

/// Orchestrates every provider's token lifecycle.
///
/// Cloning is cheap; clones share listeners and in-flight refreshes.
#[derive(Clone)]
pub struct AuthOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    vault: TokenVault,
    profiles: ProfileStore,
    registry: ProviderRegistry,
    hooks: Vec<Arc<dyn PostLoginHook>>,
    events: EventBus,
    refreshes: SingleFlight<RefreshOutcome>,
    locks: ProviderLocks,
}

impl AuthOrchestrator {
    pub fn new(vault: TokenVault, profiles: ProfileStore, registry: ProviderRegistry) -> Self {
        Self::with_hooks(vault, profiles, registry, Vec::new())
    }

    pub fn with_hooks(
        vault: TokenVault,
        profiles: ProfileStore,
        registry: ProviderRegistry,
        hooks: Vec<Arc<dyn PostLoginHook>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                vault,
                profiles,
                registry,
                hooks,
                events: EventBus::new(),
                refreshes: SingleFlight::new(),
                locks: ProviderLocks::new(),
            }),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn vault(&self) -> &TokenVault {
        &self.inner.vault
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.inner.profiles
    }

    pub fn on<F>(&self, kind: AuthEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&AuthEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    pub fn off(&self, kind: AuthEventKind, id: SubscriptionId) -> bool {
        self.inner.events.off(kind, id)
    }

    /// Run the provider's interactive flow and connect it.
    /// Returns true only if the token and the profile were both updated.
    pub async fn start_auth_flow(&self, provider: &str) -> bool {
        match self.try_start_auth_flow(provider).await {
            Ok(_) => true,
            Err(e) => {
                error!("Authentication with {} failed: {}", provider, e);
                false
            }
        }
    }

    pub async fn try_start_auth_flow(&self, provider: &str) -> AuthResult<TokenRecord> {
        let name = normalize_provider_name(provider);
        let plugin = self.inner.registry.get(&name)?;

        info!("Starting authentication flow for {}", name);
        let grant = plugin.start_auth().await?;
        if !grant.has_access_token() {
            return Err(AuthError::MissingAccessToken(name));
        }

        let account = grant.profile.clone();
        let saved = self.connect(&name, TokenRecord::from(grant)).await?;

        if let Err(e) = self.inner.profiles.touch_last_login().await {
            warn!("Could not record last login for {}: {}", name, e);
        }

        info!("Connected {}", name);
        self.emit(
            AuthEvent::new(AuthEventKind::Connected, &name)
                .with_token(saved.clone())
                .with_profile(account.clone()),
        );
        self.emit(
            AuthEvent::new(AuthEventKind::Authenticated, &name)
                .with_token(saved.clone())
                .with_profile(account),
        );

        run_post_login_hooks(&self.inner.hooks, &name, &saved).await;
        Ok(saved)
    }

    /// A usable access token, refreshing first if the stored one is
    /// expired or about to expire
    pub async fn get_access_token(&self, provider: &str) -> Option<String> {
        match self.try_get_access_token(provider).await {
            Ok(token) => token,
            Err(e) => {
                warn!("No usable access token for {}: {}", provider, e);
                None
            }
        }
    }

    pub async fn try_get_access_token(&self, provider: &str) -> AuthResult<Option<String>> {
        let name = normalize_provider_name(provider);

        let Some(record) = self.inner.vault.get_token(&name).await? else {
            return Ok(None);
        };

        if !self.inner.vault.is_expired(&record) {
            return Ok(Some(record.access_token));
        }

        debug!("Token for {} is expired or expiring, refreshing", name);
        let plugin = self.refresh_plugin(&name)?;
        let refreshed = self.refresh_observed(name, plugin, record).await?;
        Ok(Some(refreshed.access_token))
    }

    pub async fn refresh_access_token(&self, provider: &str) -> Option<String> {
        match self.try_refresh_access_token(provider).await {
            Ok(record) => Some(record.access_token),
            Err(e) => {
                warn!("Token refresh for {} failed: {}", provider, e);
                None
            }
        }
    }

    /// Refresh the stored token. Concurrent callers for the same provider
    /// share one refresh.
    pub async fn try_refresh_access_token(&self, provider: &str) -> AuthResult<TokenRecord> {
        let name = normalize_provider_name(provider);
        let plugin = self.refresh_plugin(&name)?;
        let record = self
            .inner
            .vault
            .get_token(&name)
            .await?
            .ok_or_else(|| AuthError::TokenNotFound(name.clone()))?;

        self.refresh_observed(name, plugin, record).await
    }

    fn refresh_plugin(&self, name: &str) -> AuthResult<Arc<dyn AuthProvider>> {
        let plugin = self.inner.registry.get(name)?;
        if !plugin.capabilities().supports_refresh {
            return Err(AuthError::unsupported(name, "refresh"));
        }
        Ok(plugin)
    }

    /// Refresh starting from the record the caller read. If the stored
    /// token has changed by the time the refresh runs, the stored one is
    /// returned instead of refreshing again.
    async fn refresh_observed(
        &self,
        name: String,
        plugin: Arc<dyn AuthProvider>,
        record: TokenRecord,
    ) -> AuthResult<TokenRecord> {
        if !record.can_refresh() {
            return Err(AuthError::RefreshUnavailable(name));
        }

        let inner = Arc::clone(&self.inner);
        let key = name.clone();
        let observed = record.access_token;
        self.inner
            .refreshes
            .run(&name, move || async move {
                Inner::refresh(inner, key, plugin, observed)
                    .await
                    .map_err(Arc::new)
            })
            .await
            .map_err(|source| AuthError::RefreshFailed {
                provider: name,
                source,
            })
    }

    /// Disconnect a provider. Local state is always cleared, even when
    /// remote revocation fails.
    pub async fn revoke_provider(&self, provider: &str) -> bool {
        match self.try_revoke_provider(provider).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to disconnect {}: {}", provider, e);
                false
            }
        }
    }

    pub async fn try_revoke_provider(&self, provider: &str) -> AuthResult<()> {
        let name = normalize_provider_name(provider);
        let _guard = self.inner.locks.lock(&name).await;

        let record = match self.inner.vault.get_token(&name).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not read token for {} before revoking: {}", name, e);
                None
            }
        };

        if let Some(record) = record {
            self.revoke_remote(&name, &record).await;
        }

        self.inner.vault.remove_token(&name).await?;
        match self.inner.profiles.remove_connected_provider(&name).await {
            Ok(()) | Err(AuthError::NoProfile) => {}
            Err(e) => return Err(e),
        }

        info!("Disconnected {}", name);
        self.emit(AuthEvent::new(AuthEventKind::Disconnected, &name));
        Ok(())
    }

    pub async fn get_connected_providers(&self) -> Vec<String> {
        match self.try_get_connected_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                warn!("Could not read connected providers: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn try_get_connected_providers(&self) -> AuthResult<Vec<String>> {
        Ok(self
            .inner
            .profiles
            .get_profile()
            .await?
            .map(|profile| profile.connected_providers.into_iter().collect())
            .unwrap_or_default())
    }

    /// Whether a token record exists, regardless of expiry
    pub async fn is_connected(&self, provider: &str) -> bool {
        let name = normalize_provider_name(provider);
        match self.inner.vault.get_token(&name).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!("Could not read token for {}: {}", name, e);
                false
            }
        }
    }

    pub async fn get_provider_status(&self, provider: &str) -> ProviderStatus {
        match self.try_get_provider_status(provider).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Could not determine status of {}: {}", provider, e);
                ProviderStatus::Disconnected
            }
        }
    }

    pub async fn try_get_provider_status(&self, provider: &str) -> AuthResult<ProviderStatus> {
        let name = normalize_provider_name(provider);
        let record = self.inner.vault.get_token(&name).await?;
        let now = self.inner.vault.clock().now();

        let status = ProviderStatus::classify(record.as_ref(), now);
        let expired = record.as_ref().is_some_and(|r| r.is_expired_at(now));

        // A refresh token is no use if the provider cannot refresh
        if status == ProviderStatus::Connected && expired && !self.can_refresh(&name) {
            return Ok(ProviderStatus::NeedsReauth);
        }
        Ok(status)
    }

    /// Store a user-supplied token (Home Assistant long-lived tokens and
    /// the like). The provider does not need to be registered.
    pub async fn add_local_token(
        &self,
        provider: &str,
        access_token: &str,
        metadata: Option<Metadata>,
    ) -> bool {
        match self.try_add_local_token(provider, access_token, metadata).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to add local token for {}: {}", provider, e);
                false
            }
        }
    }

    pub async fn try_add_local_token(
        &self,
        provider: &str,
        access_token: &str,
        metadata: Option<Metadata>,
    ) -> AuthResult<TokenRecord> {
        let name = normalize_provider_name(provider);
        if access_token.trim().is_empty() {
            return Err(AuthError::MissingAccessToken(name));
        }

        let record = TokenRecord::new(access_token.trim()).with_metadata(metadata);
        let saved = self.connect(&name, record).await?;

        info!("Added local token for {}", name);
        self.emit(AuthEvent::new(AuthEventKind::Connected, &name).with_token(saved.clone()));
        Ok(saved)
    }

    /// Full local reset: every token is removed and the connected set
    /// emptied. The profile itself survives.
    pub async fn reset(&self) -> bool {
        match self.try_reset().await {
            Ok(_) => true,
            Err(e) => {
                error!("Reset failed: {}", e);
                false
            }
        }
    }

    /// Returns the providers that had a token
    pub async fn try_reset(&self) -> AuthResult<Vec<String>> {
        let providers = self.inner.vault.list_providers().await?;
        let _guards = self.inner.locks.lock_all(&providers).await;
        self.inner.vault.clear_all().await?;

        match self.inner.profiles.clear_connected_providers().await {
            Ok(_) | Err(AuthError::NoProfile) => {}
            Err(e) => return Err(e),
        }

        info!("Reset {} provider connection(s)", providers.len());
        for provider in &providers {
            self.emit(AuthEvent::new(AuthEventKind::Disconnected, provider));
        }
        Ok(providers)
    }

    /// Persist the token and add the provider to the profile. If the
    /// profile cannot be updated the previous token is put back.
    async fn connect(&self, name: &str, record: TokenRecord) -> AuthResult<TokenRecord> {
        let _guard = self.inner.locks.lock(name).await;
        let vault = &self.inner.vault;
        let previous = vault.get_token(name).await?;
        let saved = vault.save_token(name, record).await?;

        if let Err(e) = self.inner.profiles.add_connected_provider(name).await {
            let restored = match previous {
                Some(previous) => vault.save_token(name, previous).await.map(|_| ()),
                None => vault.remove_token(name).await,
            };
            if let Err(rollback) = restored {
                error!("Could not roll back token for {}: {}", name, rollback);
            }
            return Err(e);
        }

        Ok(saved)
    }

    async fn revoke_remote(&self, name: &str, record: &TokenRecord) {
        let plugin = match self.inner.registry.get(name) {
            Ok(plugin) => plugin,
            Err(_) => {
                debug!("{} is not registered, skipping remote revocation", name);
                return;
            }
        };

        if !plugin.capabilities().supports_revoke {
            debug!("{} does not support revocation", name);
            return;
        }

        match plugin.revoke_token(&record.access_token).await {
            Ok(()) => info!("Revoked {} token with provider", name),
            Err(e) => warn!("Remote revocation for {} failed, continuing: {}", name, e),
        }
    }

    fn can_refresh(&self, name: &str) -> bool {
        self.inner
            .registry
            .capabilities(name)
            .is_some_and(|caps| caps.supports_refresh)
    }

    fn emit(&self, event: AuthEvent) {
        self.inner.events.emit(&event);
    }
}

impl Inner {
    async fn refresh(
        inner: Arc<Inner>,
        name: String,
        plugin: Arc<dyn AuthProvider>,
        observed: String,
    ) -> AuthResult<TokenRecord> {
        let _guard = inner.locks.lock(&name).await;

        // Re-read under the lock so the freshest refresh token is used
        let previous = inner
            .vault
            .get_token(&name)
            .await?
            .ok_or_else(|| AuthError::TokenNotFound(name.clone()))?;
        if previous.access_token != observed {
            debug!("Token for {} was replaced while waiting, skipping refresh", name);
            return Ok(previous);
        }

        let refresh_token = previous
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::RefreshUnavailable(name.clone()))?;

        info!("Refreshing token for {}", name);
        let grant = plugin.refresh_token(&refresh_token).await?;
        if !grant.has_access_token() {
            return Err(AuthError::MissingAccessToken(name));
        }

        let saved = inner
            .vault
            .save_token(&name, TokenRecord::refreshed(&previous, grant))
            .await?;

        info!("Refreshed token for {}", name);
        inner
            .events
            .emit(&AuthEvent::new(AuthEventKind::TokenRefreshed, &name).with_token(saved.clone()));
        Ok(saved)
    }
}
