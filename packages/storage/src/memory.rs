// ABOUTME: In-memory secure store used by tests and ephemeral sessions
// ABOUTME: Thread-safe map behind a tokio RwLock; nothing survives the process

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{SecureKeyStore, StorageResult};

/// Thread-safe in-memory key store
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecureKeyStore for MemoryKeyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryKeyStore::new();
        assert!(store.is_empty().await);

        store.set("auth_token_google", "{}").await.unwrap();
        assert_eq!(
            store.get("auth_token_google").await.unwrap(),
            Some("{}".to_string())
        );
        assert_eq!(store.len().await, 1);

        store.delete("auth_token_google").await.unwrap();
        assert_eq!(store.get("auth_token_google").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryKeyStore::new();
        assert!(store.delete("nothing").await.is_ok());
    }

    #[tokio::test]
    async fn test_keys_sorted_and_shared_between_clones() {
        let store = MemoryKeyStore::new();
        let clone = store.clone();

        store.set("b", "2").await.unwrap();
        clone.set("a", "1").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }
}
