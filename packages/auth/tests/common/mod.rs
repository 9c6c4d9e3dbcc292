// ABOUTME: Shared fakes and fixtures for auth integration tests
// ABOUTME: Scriptable provider, scripted device client, and an in-memory orchestrator harness

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use switchboard_auth::{
    oauth::{DeviceAuthorization, DeviceFlowClient, DevicePollResponse},
    AuthError, AuthEvent, AuthEventKind, AuthGrant, AuthOrchestrator, AuthProvider, AuthResult,
    PostLoginHook, ProfileStore, ProviderCapabilities, ProviderRegistry, TokenRecord, TokenVault,
};
use switchboard_core::ManualClock;
use switchboard_storage::{MemoryKeyStore, SecureKeyStore, StorageResult};

/// Provider whose behaviour is scripted per test
#[derive(Default)]
pub struct FakeProvider {
    name: String,
    capabilities: ProviderCapabilities,
    start_grant: Mutex<Option<AuthGrant>>,
    refresh_grants: Mutex<VecDeque<AuthGrant>>,
    refresh_delay: Option<Duration>,
    fail_revoke: bool,
    pub start_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    pub refresh_tokens_seen: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn refreshable(mut self) -> Self {
        self.capabilities.supports_refresh = true;
        self
    }

    pub fn revocable(mut self) -> Self {
        self.capabilities.supports_revoke = true;
        self
    }

    pub fn failing_revoke(mut self) -> Self {
        self.fail_revoke = true;
        self
    }

    pub fn with_start_grant(self, grant: AuthGrant) -> Self {
        *self.start_grant.lock().unwrap() = Some(grant);
        self
    }

    pub fn with_refresh_grant(self, grant: AuthGrant) -> Self {
        self.refresh_grants.lock().unwrap().push_back(grant);
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revokes(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn start_auth(&self) -> AuthResult<AuthGrant> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_grant
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AuthError::Cancelled(self.name.clone()))
    }

    async fn refresh_token(&self, refresh_token: &str) -> AuthResult<AuthGrant> {
        if !self.capabilities.supports_refresh {
            return Err(AuthError::unsupported(&self.name, "refresh"));
        }

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.refresh_grants.lock().unwrap().pop_front();
        next.ok_or_else(|| AuthError::TokenExchange("invalid_grant".to_string()))
    }

    async fn revoke_token(&self, _token: &str) -> AuthResult<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke {
            return Err(AuthError::OAuthFailed("revocation endpoint down".to_string()));
        }
        Ok(())
    }
}

/// Grant that expires an hour after it is saved
pub fn hour_grant(access: &str, refresh: Option<&str>) -> AuthGrant {
    AuthGrant {
        refresh_token: refresh.map(str::to_string),
        expires_in: Some(3600),
        token_type: Some("Bearer".to_string()),
        ..AuthGrant::new(access)
    }
}

/// Device client that answers polls from a script, then stays pending
pub struct ScriptedDeviceClient {
    authorization: DeviceAuthorization,
    responses: Mutex<VecDeque<DevicePollResponse>>,
    pub polls: AtomicUsize,
}

impl ScriptedDeviceClient {
    pub fn new(interval: u64, expires_in: u64, responses: Vec<DevicePollResponse>) -> Self {
        Self {
            authorization: DeviceAuthorization {
                device_code: "device-code-1".to_string(),
                user_code: "WDJB-MJHT".to_string(),
                verification_uri: "https://example.com/device".to_string(),
                verification_uri_complete: None,
                expires_in,
                interval,
            },
            responses: Mutex::new(responses.into()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn authorization(&self) -> &DeviceAuthorization {
        &self.authorization
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceFlowClient for ScriptedDeviceClient {
    async fn request_device_code(&self) -> AuthResult<DeviceAuthorization> {
        Ok(self.authorization.clone())
    }

    async fn poll_token(&self, device_code: &str) -> AuthResult<DevicePollResponse> {
        assert_eq!(device_code, self.authorization.device_code);
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DevicePollResponse::Pending))
    }
}

/// Hook counting the logins it sees
#[derive(Default)]
pub struct RecordingHook {
    pub logins: Mutex<Vec<String>>,
}

#[async_trait]
impl PostLoginHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    async fn after_login(&self, provider: &str, _token: &TokenRecord) -> anyhow::Result<()> {
        self.logins.lock().unwrap().push(provider.to_string());
        Ok(())
    }
}

pub struct FailingHook;

#[async_trait]
impl PostLoginHook for FailingHook {
    async fn after_login(&self, _provider: &str, _token: &TokenRecord) -> anyhow::Result<()> {
        anyhow::bail!("analytics endpoint unreachable")
    }
}

pub struct Harness {
    pub orchestrator: AuthOrchestrator,
    pub store: MemoryKeyStore,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn vault(&self) -> &TokenVault {
        self.orchestrator.vault()
    }

    pub fn profiles(&self) -> &ProfileStore {
        self.orchestrator.profiles()
    }
}

/// Store whose reads return the value present when the read began, but
/// only after `delay`. Writes go straight through.
pub struct SlowReadStore {
    inner: MemoryKeyStore,
    delay: Duration,
}

impl SlowReadStore {
    pub fn new(inner: MemoryKeyStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl SecureKeyStore for SlowReadStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self.inner.get(key).await?;
        tokio::time::sleep(self.delay).await;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys().await
    }
}

/// Orchestrator over an empty in-memory store, without a profile
pub fn harness_with_hooks(
    providers: Vec<Arc<dyn AuthProvider>>,
    hooks: Vec<Arc<dyn PostLoginHook>>,
) -> Harness {
    let store = MemoryKeyStore::new();
    harness_over(Arc::new(store.clone()), store, providers, hooks)
}

/// Onboarded orchestrator whose token reads lag behind writes by `delay`
pub async fn slow_read_harness(providers: Vec<Arc<dyn AuthProvider>>, delay: Duration) -> Harness {
    let store = MemoryKeyStore::new();
    let backing = Arc::new(SlowReadStore::new(store.clone(), delay));
    let harness = harness_over(backing, store, providers, Vec::new());
    harness
        .profiles()
        .create_profile("local-user")
        .await
        .unwrap();
    harness
}

fn harness_over(
    backing: Arc<dyn SecureKeyStore>,
    store: MemoryKeyStore,
    providers: Vec<Arc<dyn AuthProvider>>,
    hooks: Vec<Arc<dyn PostLoginHook>>,
) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());

    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }

    let vault = TokenVault::with_clock(backing.clone(), clock.clone());
    let profiles = ProfileStore::with_clock(backing, clock.clone());
    let orchestrator = AuthOrchestrator::with_hooks(vault, profiles, registry, hooks);

    Harness {
        orchestrator,
        store,
        clock,
    }
}

/// Onboarded orchestrator: the profile already exists
pub async fn harness(providers: Vec<Arc<dyn AuthProvider>>) -> Harness {
    let harness = harness_with_hooks(providers, Vec::new());
    harness
        .profiles()
        .create_profile("local-user")
        .await
        .unwrap();
    harness
}

/// Collect every event of `kind` the orchestrator emits
pub fn record_events(orchestrator: &AuthOrchestrator, kind: AuthEventKind) -> Arc<Mutex<Vec<AuthEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    orchestrator.on(kind, move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    events
}
