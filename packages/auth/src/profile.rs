// ABOUTME: The single local connection profile and its persisted set of connected providers
// ABOUTME: All mutations are read-modify-write under one async lock to avoid lost updates

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use switchboard_core::{SharedClock, SystemClock, PROFILE_KEY};
use switchboard_storage::{SecureKeyStore, StorageError};

use crate::error::{AuthError, AuthResult};

/// The local user's identity and connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub connected_providers: BTreeSet<String>,
}

impl ConnectionProfile {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            avatar: None,
            created_at,
            last_login: None,
            connected_providers: BTreeSet::new(),
        }
    }
}

/// Partial update of profile details; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Persistence for the connection profile
pub struct ProfileStore {
    store: Arc<dyn SecureKeyStore>,
    clock: SharedClock,
    write_lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SecureKeyStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn get_profile(&self) -> AuthResult<Option<ConnectionProfile>> {
        let raw = match self.store.get(PROFILE_KEY).await {
            Ok(raw) => raw,
            Err(StorageError::Corrupted(_)) => {
                warn!("Ignoring undecryptable connection profile");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(profile) => Ok(Some(profile)),
                Err(e) => {
                    warn!("Ignoring corrupted connection profile: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn save_profile(&self, profile: &ConnectionProfile) -> AuthResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write(profile).await
    }

    pub async fn clear_profile(&self) -> AuthResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(PROFILE_KEY).await?;
        info!("Cleared connection profile");
        Ok(())
    }

    /// Create the profile during onboarding. Returns the existing profile
    /// untouched if one is already stored.
    pub async fn create_profile(&self, id: &str) -> AuthResult<ConnectionProfile> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.get_profile().await? {
            return Ok(existing);
        }

        let profile = ConnectionProfile::new(id, self.clock.now());
        self.write(&profile).await?;
        info!("Created connection profile {}", id);
        Ok(profile)
    }

    /// Returns true if the provider was newly added
    pub async fn add_connected_provider(&self, name: &str) -> AuthResult<bool> {
        self.modify(|profile| {
            let added = profile.connected_providers.insert(name.to_string());
            (added, added)
        })
        .await
    }

    pub async fn remove_connected_provider(&self, name: &str) -> AuthResult<()> {
        self.modify(|profile| {
            profile.connected_providers.remove(name);
            ((), true)
        })
        .await
    }

    pub async fn is_provider_connected(&self, name: &str) -> AuthResult<bool> {
        let profile = self.get_profile().await?.ok_or(AuthError::NoProfile)?;
        Ok(profile.connected_providers.contains(name))
    }

    pub async fn update_profile_details(
        &self,
        update: ProfileUpdate,
    ) -> AuthResult<ConnectionProfile> {
        self.modify(|profile| {
            if let Some(name) = update.name {
                profile.name = Some(name);
            }
            if let Some(email) = update.email {
                profile.email = Some(email);
            }
            if let Some(avatar) = update.avatar {
                profile.avatar = Some(avatar);
            }
            (profile.clone(), true)
        })
        .await
    }

    pub async fn touch_last_login(&self) -> AuthResult<()> {
        let now = self.clock.now();
        self.modify(|profile| {
            profile.last_login = Some(now);
            ((), true)
        })
        .await
    }

    /// Empty the connected set, returning what it held
    pub async fn clear_connected_providers(&self) -> AuthResult<Vec<String>> {
        self.modify(|profile| {
            let cleared: Vec<String> = std::mem::take(&mut profile.connected_providers)
                .into_iter()
                .collect();
            let changed = !cleared.is_empty();
            (cleared, changed)
        })
        .await
    }

    /// Read-modify-write under the write lock. The closure returns its
    /// result and whether the profile must be persisted.
    async fn modify<T, F>(&self, f: F) -> AuthResult<T>
    where
        F: FnOnce(&mut ConnectionProfile) -> (T, bool),
    {
        let _guard = self.write_lock.lock().await;

        let mut profile = self.get_profile().await?.ok_or(AuthError::NoProfile)?;
        let (result, persist) = f(&mut profile);
        if persist {
            self.write(&profile).await?;
        }
        Ok(result)
    }

    async fn write(&self, profile: &ConnectionProfile) -> AuthResult<()> {
        let serialized = serde_json::to_string(profile)?;
        self.store.set(PROFILE_KEY, &serialized).await?;
        debug!("Persisted connection profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use switchboard_storage::MemoryKeyStore;

    fn setup() -> (ProfileStore, MemoryKeyStore) {
        let store = MemoryKeyStore::new();
        (ProfileStore::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_operations_without_profile_fail() {
        let (profiles, _store) = setup();

        assert!(profiles.get_profile().await.unwrap().is_none());
        assert!(matches!(
            profiles.add_connected_provider("google").await,
            Err(AuthError::NoProfile)
        ));
        assert!(matches!(
            profiles.remove_connected_provider("google").await,
            Err(AuthError::NoProfile)
        ));
        assert!(matches!(
            profiles.is_provider_connected("google").await,
            Err(AuthError::NoProfile)
        ));
        assert!(matches!(
            profiles.update_profile_details(ProfileUpdate::default()).await,
            Err(AuthError::NoProfile)
        ));
        // Nothing was created as a side effect
        assert!(profiles.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_profile_is_idempotent() {
        let (profiles, _store) = setup();

        let first = profiles.create_profile("local-user").await.unwrap();
        profiles.add_connected_provider("github").await.unwrap();
        let second = profiles.create_profile("someone-else").await.unwrap();

        assert_eq!(second.id, first.id);
        assert!(second.connected_providers.contains("github"));
    }

    #[tokio::test]
    async fn test_add_and_remove_connected_provider() {
        let (profiles, _store) = setup();
        profiles.create_profile("local-user").await.unwrap();

        assert!(profiles.add_connected_provider("spotify").await.unwrap());
        assert!(!profiles.add_connected_provider("spotify").await.unwrap());
        assert!(profiles.is_provider_connected("spotify").await.unwrap());

        profiles.remove_connected_provider("spotify").await.unwrap();
        profiles.remove_connected_provider("spotify").await.unwrap();
        assert!(!profiles.is_provider_connected("spotify").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_profile_details_merges() {
        let (profiles, _store) = setup();
        profiles.create_profile("local-user").await.unwrap();

        profiles
            .update_profile_details(ProfileUpdate {
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                avatar: None,
            })
            .await
            .unwrap();
        let updated = profiles
            .update_profile_details(ProfileUpdate {
                avatar: Some("https://example.com/a.png".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.email.as_deref(), Some("ada@example.com"));
        assert_eq!(updated.avatar.as_deref(), Some("https://example.com/a.png"));
    }

    #[tokio::test]
    async fn test_profile_json_layout() {
        let (profiles, store) = setup();
        profiles.create_profile("local-user").await.unwrap();
        profiles.add_connected_provider("slack").await.unwrap();
        profiles.add_connected_provider("discord").await.unwrap();

        let raw = store.get("master_profile").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(json["id"], "local-user");
        assert!(json["createdAt"].is_string());
        assert_eq!(json["connectedProviders"], serde_json::json!(["discord", "slack"]));
    }

    #[tokio::test]
    async fn test_corrupted_profile_reads_as_none() {
        let (profiles, store) = setup();
        store.set("master_profile", "garbage").await.unwrap();
        assert!(profiles.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let (profiles, _store) = setup();
        profiles.create_profile("local-user").await.unwrap();

        let names: Vec<String> = (0..16).map(|i| format!("provider{}", i)).collect();
        let adds = names.iter().map(|name| profiles.add_connected_provider(name));
        let results = futures::future::join_all(adds).await;
        assert!(results.iter().all(|r| matches!(r, Ok(true))));

        let profile = profiles.get_profile().await.unwrap().unwrap();
        assert_eq!(profile.connected_providers.len(), 16);
    }

    #[tokio::test]
    async fn test_clear_connected_providers() {
        let (profiles, _store) = setup();
        profiles.create_profile("local-user").await.unwrap();
        profiles.add_connected_provider("a").await.unwrap();
        profiles.add_connected_provider("b").await.unwrap();

        let cleared = profiles.clear_connected_providers().await.unwrap();
        assert_eq!(cleared, vec!["a".to_string(), "b".to_string()]);
        assert!(profiles
            .get_profile()
            .await
            .unwrap()
            .unwrap()
            .connected_providers
            .is_empty());
    }
}
