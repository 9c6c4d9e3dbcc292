// ABOUTME: Per-key single-flight coordination and per-provider write locks
// ABOUTME: Concurrent refreshes share one future; token writes for a provider are serialized

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type InFlight<T> = Shared<BoxFuture<'static, T>>;

/// At most one running operation per key. The entry is dropped as soon as
/// the operation completes, so a later call starts a fresh one.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    in_flight: Arc<Mutex<HashMap<String, InFlight<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the running operation for `key`, or start one with `start`
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

            match in_flight.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight operation for {}", key);
                    existing.clone()
                }
                None => {
                    let table = Arc::clone(&self.in_flight);
                    let owned_key = key.to_string();
                    let operation = start();

                    let flight = async move {
                        let result = operation.await;
                        table
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

/// One async lock per provider. Every read-modify-write of a provider's
/// token holds it, so a refresh cannot write back over a disconnect.
#[derive(Default)]
pub struct ProviderLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProviderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Locks for several providers, taken in sorted order
    pub async fn lock_all(&self, keys: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys: Vec<&String> = keys.iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }
}
