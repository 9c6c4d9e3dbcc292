// ABOUTME: Lifecycle event bus for connection changes and token refreshes
// ABOUTME: Listeners run synchronously in registration order with failures isolated

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::types::TokenRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    Connected,
    Disconnected,
    TokenRefreshed,
    Authenticated,
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::TokenRefreshed => write!(f, "token_refreshed"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub provider: String,
    pub token: Option<TokenRecord>,
    /// Account details returned by the provider, if any
    pub profile: Option<serde_json::Value>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, provider: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            token: None,
            profile: None,
        }
    }

    pub fn with_token(mut self, token: TokenRecord) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_profile(mut self, profile: Option<serde_json::Value>) -> Self {
        self.profile = profile;
        self
    }
}

/// Handle returned by [`EventBus::on`], used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&AuthEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<AuthEventKind, Vec<(SubscriptionId, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: AuthEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&AuthEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        debug!("Registered {} listener {:?}", kind, id);
        id
    }

    /// Returns false if the handle was not registered for `kind`
    pub fn off(&self, kind: AuthEventKind, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let Some(subscribers) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    pub fn listener_count(&self, kind: AuthEventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every listener of its kind.
    ///
    /// The listener list is snapshotted first so listeners may register or
    /// unregister while being dispatched.
    pub fn emit(&self, event: &AuthEvent) {
        let snapshot: Vec<(SubscriptionId, Listener)> =
            self.lock().get(&event.kind).cloned().unwrap_or_default();

        debug!(
            "Emitting {} for {} to {} listener(s)",
            event.kind,
            event.provider,
            snapshot.len()
        );

        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "{} listener {:?} failed for {}: {:#}",
                    event.kind, id, event.provider, e
                ),
                Err(_) => error!(
                    "{} listener {:?} panicked for {}",
                    event.kind, id, event.provider
                ),
            }
        }
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<AuthEventKind, Vec<(SubscriptionId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}
