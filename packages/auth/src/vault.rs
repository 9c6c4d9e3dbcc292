// ABOUTME: Token vault persisting one token record per provider in the secure store
// ABOUTME: Normalizes expiry and scopes on save; corrupted records read back as absent

use std::sync::Arc;

use tracing::{debug, warn};

use switchboard_core::{provider_from_token_key, token_key, SharedClock, SystemClock};
use switchboard_storage::{SecureKeyStore, StorageError};

use crate::{error::AuthResult, types::TokenRecord};

/// Per-provider token persistence
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn SecureKeyStore>,
    clock: SharedClock,
}

impl TokenVault {
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SecureKeyStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Normalize and persist a record, replacing any previous one.
    /// Returns the record as stored.
    pub async fn save_token(&self, provider: &str, mut record: TokenRecord) -> AuthResult<TokenRecord> {
        record.normalize(self.clock.now());

        let serialized = serde_json::to_string(&record)?;
        self.store.set(&token_key(provider), &serialized).await?;

        debug!("Stored token for provider: {}", provider);
        Ok(record)
    }

    /// Read a provider's record. Unreadable or unparseable records are
    /// reported as absent.
    pub async fn get_token(&self, provider: &str) -> AuthResult<Option<TokenRecord>> {
        let raw = match self.store.get(&token_key(provider)).await {
            Ok(raw) => raw,
            Err(StorageError::Corrupted(key)) => {
                warn!("Ignoring undecryptable token entry {}", key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(raw) = raw else {
            debug!("No token found for provider: {}", provider);
            return Ok(None);
        };

        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring corrupted token record for {}: {}", provider, e);
                Ok(None)
            }
        }
    }

    pub async fn remove_token(&self, provider: &str) -> AuthResult<()> {
        self.store.delete(&token_key(provider)).await?;
        debug!("Removed token for provider: {}", provider);
        Ok(())
    }

    pub fn is_expired(&self, record: &TokenRecord) -> bool {
        record.is_expired_at(self.clock.now())
    }

    /// Providers that currently have a stored entry
    pub async fn list_providers(&self) -> AuthResult<Vec<String>> {
        let mut providers: Vec<String> = self
            .store
            .keys()
            .await?
            .iter()
            .filter_map(|key| provider_from_token_key(key))
            .map(str::to_string)
            .collect();
        providers.sort();
        Ok(providers)
    }

    /// Remove every provider's token
    pub async fn clear_all(&self) -> AuthResult<()> {
        for provider in self.list_providers().await? {
            self.remove_token(&provider).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use switchboard_core::{Clock, ManualClock};
    use switchboard_storage::MemoryKeyStore;

    fn setup() -> (TokenVault, MemoryKeyStore, Arc<ManualClock>) {
        let store = MemoryKeyStore::new();
        let clock = Arc::new(ManualClock::starting_now());
        let vault = TokenVault::with_clock(Arc::new(store.clone()), clock.clone());
        (vault, store, clock)
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let (vault, _store, clock) = setup();
        let record = TokenRecord {
            refresh_token: Some("r1".to_string()),
            expires_in: Some(3600),
            token_type: Some("Bearer".to_string()),
            scope: Some("identify email".to_string()),
            ..TokenRecord::new("a1")
        };

        let saved = vault.save_token("discord", record.clone()).await.unwrap();
        let loaded = vault.get_token("discord").await.unwrap().unwrap();

        assert_eq!(loaded.access_token, record.access_token);
        assert_eq!(loaded.token_type, saved.token_type);
        assert_eq!(loaded.refresh_token, record.refresh_token);
        // Millisecond precision survives serialization
        assert_eq!(
            loaded.expires_at.map(|t| t.timestamp_millis()),
            Some((clock.now() + Duration::seconds(3600)).timestamp_millis())
        );
        assert_eq!(
            loaded.expires_at.map(|t| t.timestamp_millis()),
            saved.expires_at.map(|t| t.timestamp_millis())
        );
        assert_eq!(
            loaded.scopes,
            Some(vec!["identify".to_string(), "email".to_string()])
        );
    }

    #[tokio::test]
    async fn test_save_writes_provider_scoped_key() {
        let (vault, store, _clock) = setup();
        vault.save_token("reddit", TokenRecord::new("x")).await.unwrap();

        let raw = store.get("auth_token_reddit").await.unwrap().unwrap();
        assert_eq!(raw, r#"{"access_token":"x"}"#);
    }

    #[tokio::test]
    async fn test_corrupted_record_reads_as_none() {
        let (vault, store, _clock) = setup();
        store.set("auth_token_google", "{not json").await.unwrap();

        assert_eq!(vault.get_token("google").await.unwrap(), None);

        store
            .set("auth_token_google", r#"{"refresh_token":"no access token"}"#)
            .await
            .unwrap();
        assert_eq!(vault.get_token("google").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (vault, _store, _clock) = setup();
        vault.save_token("slack", TokenRecord::new("x")).await.unwrap();

        vault.remove_token("slack").await.unwrap();
        vault.remove_token("slack").await.unwrap();
        assert_eq!(vault.get_token("slack").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (vault, _store, clock) = setup();

        let soon = TokenRecord {
            expires_at: Some(clock.now() + Duration::minutes(4)),
            ..TokenRecord::new("a")
        };
        let later = TokenRecord {
            expires_at: Some(clock.now() + Duration::minutes(10)),
            ..TokenRecord::new("b")
        };

        assert!(vault.is_expired(&soon));
        assert!(!vault.is_expired(&later));
        assert!(!vault.is_expired(&TokenRecord::new("durable")));

        clock.advance(Duration::minutes(6));
        assert!(vault.is_expired(&later));
    }

    #[tokio::test]
    async fn test_list_providers_and_clear_all() {
        let (vault, store, _clock) = setup();
        store.set("master_profile", "{}").await.unwrap();
        vault.save_token("spotify", TokenRecord::new("s")).await.unwrap();
        vault.save_token("github", TokenRecord::new("g")).await.unwrap();

        assert_eq!(
            vault.list_providers().await.unwrap(),
            vec!["github".to_string(), "spotify".to_string()]
        );

        vault.clear_all().await.unwrap();
        assert!(vault.list_providers().await.unwrap().is_empty());
        // The profile is not a token and survives
        assert!(store.get("master_profile").await.unwrap().is_some());
    }
}
