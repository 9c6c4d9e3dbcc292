// ABOUTME: Secure key-value store contract and backends for Switchboard
// ABOUTME: Opaque get/set/delete of string blobs, in memory or encrypted in SQLite

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKeyStore;
pub use sqlite::SqliteKeyStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A stored value exists but cannot be decrypted or decoded
    #[error("Stored value for '{0}' is corrupted")]
    Corrupted(String),

    #[error("Invalid store password")]
    InvalidPassword,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Opaque secure key-value store.
///
/// Values are string blobs; implementations are expected to keep them
/// encrypted at rest. `delete` of a missing key is not an error.
#[async_trait]
pub trait SecureKeyStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// All keys currently present
    async fn keys(&self) -> StorageResult<Vec<String>>;
}
