// ABOUTME: SQLite-backed secure store with encrypted values
// ABOUTME: Keys are stored in clear, values are sealed with SecretCipher before writing

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, error, info};

use switchboard_security::{EncryptionMode, KdfParams, SecretCipher};

use crate::{SecureKeyStore, StorageError, StorageResult};

/// Encrypted key-value store in a SQLite database
pub struct SqliteKeyStore {
    pool: SqlitePool,
    cipher: SecretCipher,
}

impl SqliteKeyStore {
    /// Open (creating if needed) a SQLite database file for the store
    pub async fn connect_file(path: &Path) -> StorageResult<SqlitePool> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::InvalidInput(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        debug!("Connected secure store database at {}", path.display());
        Ok(pool)
    }

    /// Store sealed with a caller-provided cipher. Does not record an
    /// encryption mode.
    pub async fn with_cipher(pool: SqlitePool, cipher: SecretCipher) -> StorageResult<Self> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool, cipher })
    }

    /// Store sealed with the machine-derived key
    pub async fn open_machine(pool: SqlitePool) -> StorageResult<Self> {
        Self::init_schema(&pool).await?;

        match Self::stored_mode(&pool).await? {
            Some(EncryptionMode::Password) => {
                return Err(StorageError::InvalidInput(
                    "Store is password protected; a password is required".to_string(),
                ))
            }
            Some(_) => {}
            None => {
                sqlx::query("INSERT INTO secure_store_meta (id, mode) VALUES (1, 'machine')")
                    .execute(&pool)
                    .await?;
            }
        }

        let cipher = SecretCipher::with_machine_key().map_err(|e| {
            error!("Failed to initialize machine key encryption: {}", e);
            StorageError::Encryption(format!("Failed to initialize encryption: {}", e))
        })?;

        Ok(Self { pool, cipher })
    }

    /// Store sealed with a password-derived key.
    ///
    /// The first open records a random salt and a verification hash; later
    /// opens reject a different password with `InvalidPassword`.
    pub async fn open_with_password(
        pool: SqlitePool,
        password: &str,
        params: KdfParams,
    ) -> StorageResult<Self> {
        Self::init_schema(&pool).await?;

        let row = sqlx::query("SELECT mode, salt, password_hash FROM secure_store_meta WHERE id = 1")
            .fetch_optional(&pool)
            .await?;

        let salt = match row {
            Some(row) => {
                let mode: String = row.try_get("mode")?;
                if mode != EncryptionMode::Password.to_string() {
                    return Err(StorageError::InvalidInput(format!(
                        "Store uses {} encryption, not password",
                        mode
                    )));
                }
                let salt: Vec<u8> = row.try_get("salt")?;
                let stored_hash: Vec<u8> = row.try_get("password_hash")?;

                let verified = {
                    let password = password.to_string();
                    let salt = salt.clone();
                    tokio::task::spawn_blocking(move || {
                        SecretCipher::verify_password(&password, &salt, &stored_hash, params)
                    })
                    .await
                    .map_err(|e| StorageError::Encryption(e.to_string()))?
                    .map_err(|e| StorageError::Encryption(e.to_string()))?
                };

                if !verified {
                    return Err(StorageError::InvalidPassword);
                }
                salt
            }
            None => {
                let salt = SecretCipher::generate_salt()
                    .map_err(|e| StorageError::Encryption(e.to_string()))?;
                let hash = {
                    let password = password.to_string();
                    let salt = salt.clone();
                    tokio::task::spawn_blocking(move || {
                        SecretCipher::hash_password_for_verification(&password, &salt, params)
                    })
                    .await
                    .map_err(|e| StorageError::Encryption(e.to_string()))?
                    .map_err(|e| StorageError::Encryption(e.to_string()))?
                };

                sqlx::query(
                    "INSERT INTO secure_store_meta (id, mode, salt, password_hash) VALUES (1, 'password', ?, ?)",
                )
                .bind(&salt)
                .bind(&hash)
                .execute(&pool)
                .await?;

                info!("Initialized password-protected secure store");
                salt
            }
        };

        let cipher = {
            let password = password.to_string();
            tokio::task::spawn_blocking(move || SecretCipher::with_password(&password, &salt, params))
                .await
                .map_err(|e| StorageError::Encryption(e.to_string()))?
                .map_err(|e| StorageError::Encryption(e.to_string()))?
        };

        Ok(Self { pool, cipher })
    }

    pub fn encryption_mode(&self) -> EncryptionMode {
        self.cipher.mode()
    }

    async fn init_schema(pool: &SqlitePool) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS secure_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS secure_store_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                mode TEXT NOT NULL,
                salt BLOB,
                password_hash BLOB
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn stored_mode(pool: &SqlitePool) -> StorageResult<Option<EncryptionMode>> {
        let mode: Option<String> =
            sqlx::query_scalar("SELECT mode FROM secure_store_meta WHERE id = 1")
                .fetch_optional(pool)
                .await?;

        mode.map(|m| {
            m.parse::<EncryptionMode>()
                .map_err(|e| StorageError::InvalidInput(e.to_string()))
        })
        .transpose()
    }
}

#[async_trait]
impl SecureKeyStore for SqliteKeyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!("Reading secure store key {}", key);

        let sealed: Option<String> =
            sqlx::query_scalar("SELECT value FROM secure_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match sealed {
            Some(sealed) => {
                let value = self.cipher.decrypt(&sealed).map_err(|e| {
                    error!("Failed to decrypt secure store value for {}: {}", key, e);
                    StorageError::Corrupted(key.to_string())
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!("Writing secure store key {}", key);

        let sealed = self.cipher.encrypt(value).map_err(|e| {
            error!("Failed to encrypt secure store value: {}", e);
            StorageError::Encryption(e.to_string())
        })?;

        sqlx::query(
            r#"
            INSERT INTO secure_store (key, value, updated_at)
            VALUES (?, ?, unixepoch())
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = unixepoch()
            "#,
        )
        .bind(key)
        .bind(&sealed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting secure store key {}", key);

        sqlx::query("DELETE FROM secure_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM secure_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }
}
