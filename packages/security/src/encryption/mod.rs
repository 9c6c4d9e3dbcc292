// ABOUTME: Secure-store value encryption using ChaCha20-Poly1305 AEAD
// ABOUTME: Keys come from the machine identity (default), a password (Argon2id), or the caller
//
// SECURITY MODEL:
//
// Machine mode derives the key from machine ID + username + hostname with
// HKDF. Anyone with local access on the same machine can reproduce it, so it
// only protects copies of the database that leave the machine.
//
// Password mode derives the key with Argon2id from a user password and a
// stored random salt. Values cannot be decrypted without the password.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use argon2::{Argon2, ParamsBuilder, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::{
    aead::{self, Nonce, UnboundKey},
    error::Unspecified,
    rand::{SecureRandom, SystemRandom},
};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Application salt for machine key derivation (constant, not secret)
const APP_SALT: &[u8] = b"switchboard-secure-store-v1";

/// Nonce size for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Size of the derived key and of password salts
pub const KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Failed to generate random data: {0}")]
    RandomGeneration(String),

    #[error("Failed to encrypt data: {0}")]
    Encryption(String),

    #[error("Failed to decrypt data: {0}")]
    Decryption(String),

    #[error("Failed to derive encryption key: {0}")]
    KeyDerivation(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,

    #[error("Invalid encryption mode: {0}")]
    InvalidMode(String),

    #[error("Password required for password-based encryption")]
    PasswordRequired,
}

impl From<Unspecified> for EncryptionError {
    fn from(_: Unspecified) -> Self {
        EncryptionError::Encryption("Cryptographic operation failed".to_string())
    }
}

/// Where the encryption key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    Machine,
    Password,
    Supplied,
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machine => write!(f, "machine"),
            Self::Password => write!(f, "password"),
            Self::Supplied => write!(f, "supplied"),
        }
    }
}

impl FromStr for EncryptionMode {
    type Err = EncryptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "machine" => Ok(Self::Machine),
            "password" => Ok(Self::Password),
            "supplied" => Ok(Self::Supplied),
            other => Err(EncryptionError::InvalidMode(other.to_string())),
        }
    }
}

/// Argon2id cost parameters for password-derived keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // Memory: 64 MB, Iterations: 3, Parallelism: 4
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and throwaway stores
    pub fn light() -> Self {
        Self {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn derive(&self, input: &[u8], salt: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let params = ParamsBuilder::new()
            .m_cost(self.m_cost)
            .t_cost(self.t_cost)
            .p_cost(self.p_cost)
            .output_len(KEY_SIZE)
            .build()
            .map_err(|e| EncryptionError::KeyDerivation(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut output = vec![0u8; KEY_SIZE];
        argon2
            .hash_password_into(input, salt, &mut output)
            .map_err(|e| {
                EncryptionError::KeyDerivation(format!("Argon2 derivation failed: {}", e))
            })?;
        Ok(output)
    }
}

/// Encrypts and decrypts secure-store values
#[derive(Debug, Clone)]
pub struct SecretCipher {
    rng: Arc<SystemRandom>,
    encryption_key: Vec<u8>,
    mode: EncryptionMode,
}

impl SecretCipher {
    fn validate_password_and_salt(password: &str, salt: &[u8]) -> Result<(), EncryptionError> {
        if password.is_empty() {
            return Err(EncryptionError::PasswordRequired);
        }

        if salt.len() != KEY_SIZE {
            return Err(EncryptionError::KeyDerivation(format!(
                "Salt must be {} bytes",
                KEY_SIZE
            )));
        }

        Ok(())
    }

    /// Cipher keyed from this machine's identity
    pub fn with_machine_key() -> Result<Self, EncryptionError> {
        let machine_id = machine_uid::get().map_err(|e| {
            EncryptionError::KeyDerivation(format!("Failed to get machine ID: {}", e))
        })?;

        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".to_string());

        let hostname = hostname::get()
            .map_err(|e| EncryptionError::KeyDerivation(format!("Failed to get hostname: {}", e)))?
            .to_string_lossy()
            .to_string();

        let mut key_material =
            Vec::with_capacity(machine_id.len() + username.len() + hostname.len() + APP_SALT.len());
        key_material.extend_from_slice(machine_id.as_bytes());
        key_material.extend_from_slice(username.as_bytes());
        key_material.extend_from_slice(hostname.as_bytes());
        key_material.extend_from_slice(APP_SALT);

        use ring::hkdf;
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, b"switchboard-encryption-salt");
        let prk = salt.extract(&key_material);

        let mut encryption_key = vec![0u8; KEY_SIZE];
        prk.expand(&[b"secure-store-encryption"], hkdf::HKDF_SHA256)
            .map_err(|_| EncryptionError::KeyDerivation("HKDF expansion failed".to_string()))?
            .fill(&mut encryption_key)
            .map_err(|_| EncryptionError::KeyDerivation("Key fill failed".to_string()))?;

        debug!("Derived machine-bound secure store key");
        Ok(Self {
            rng: Arc::new(SystemRandom::new()),
            encryption_key,
            mode: EncryptionMode::Machine,
        })
    }

    /// Cipher keyed from a password and a stored salt
    pub fn with_password(
        password: &str,
        salt: &[u8],
        params: KdfParams,
    ) -> Result<Self, EncryptionError> {
        Self::validate_password_and_salt(password, salt)?;

        let encryption_key = params.derive(password.as_bytes(), salt)?;

        Ok(Self {
            rng: Arc::new(SystemRandom::new()),
            encryption_key,
            mode: EncryptionMode::Password,
        })
    }

    /// Cipher over a caller-provided 256-bit key
    pub fn from_key(key: [u8; KEY_SIZE]) -> Self {
        Self {
            rng: Arc::new(SystemRandom::new()),
            encryption_key: key.to_vec(),
            mode: EncryptionMode::Supplied,
        }
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Generate a random salt for password-based encryption
    pub fn generate_salt() -> Result<Vec<u8>, EncryptionError> {
        let mut salt = vec![0u8; KEY_SIZE];
        SystemRandom::new().fill(&mut salt).map_err(|_| {
            EncryptionError::RandomGeneration("Failed to generate salt".to_string())
        })?;
        Ok(salt)
    }

    /// Hash a password for verification (never equal to the encryption key)
    pub fn hash_password_for_verification(
        password: &str,
        salt: &[u8],
        params: KdfParams,
    ) -> Result<Vec<u8>, EncryptionError> {
        Self::validate_password_and_salt(password, salt)?;

        // Context suffix keeps the verification hash distinct from the key
        let password_with_context = format!("{}|verification", password);
        params.derive(password_with_context.as_bytes(), salt)
    }

    /// Verify a password against a stored verification hash
    pub fn verify_password(
        password: &str,
        salt: &[u8],
        stored_hash: &[u8],
        params: KdfParams,
    ) -> Result<bool, EncryptionError> {
        let computed_hash = Self::hash_password_for_verification(password, salt, params)?;
        Ok(computed_hash.ct_eq(stored_hash).unwrap_u8() == 1)
    }

    /// Encrypt a value
    /// Returns base64-encoded: nonce || ciphertext || tag
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            EncryptionError::RandomGeneration("Failed to generate nonce".to_string())
        })?;

        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)?;

        let unbound_key = UnboundKey::new(&aead::CHACHA20_POLY1305, &self.encryption_key)?;
        let sealing_key = aead::LessSafeKey::new(unbound_key);

        let mut in_out = plaintext.as_bytes().to_vec();
        sealing_key
            .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| EncryptionError::Encryption("Seal operation failed".to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + in_out.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&in_out);

        Ok(BASE64.encode(&result))
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`]
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, EncryptionError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let encrypted_data = BASE64
            .decode(ciphertext)
            .map_err(|_| EncryptionError::InvalidFormat)?;

        if encrypted_data.len() < NONCE_SIZE + aead::CHACHA20_POLY1305.tag_len() {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext_and_tag) = encrypted_data.split_at(NONCE_SIZE);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)?;

        let unbound_key = UnboundKey::new(&aead::CHACHA20_POLY1305, &self.encryption_key)?;
        let opening_key = aead::LessSafeKey::new(unbound_key);

        let mut in_out = ciphertext_and_tag.to_vec();
        let plaintext = opening_key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| EncryptionError::Decryption("Open operation failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| EncryptionError::Decryption("Invalid UTF-8 in decrypted data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_cipher() -> SecretCipher {
        SecretCipher::from_key([7u8; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let plaintext = r#"{"access_token":"ya29.a0AfH6SM"}"#;

        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert!(!encrypted.is_empty());
        assert_ne!(encrypted, plaintext);

        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_empty_string() {
        let cipher = test_cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
    }

    #[test]
    fn test_different_nonces() {
        let cipher = test_cipher();

        let encrypted1 = cipher.encrypt("secret").unwrap();
        let encrypted2 = cipher.encrypt("secret").unwrap();

        // Same plaintext should produce different ciphertext (different nonces)
        assert_ne!(encrypted1, encrypted2);
        assert_eq!(cipher.decrypt(&encrypted1).unwrap(), "secret");
        assert_eq!(cipher.decrypt(&encrypted2).unwrap(), "secret");
    }

    #[test]
    fn test_decrypt_invalid_data() {
        let cipher = test_cipher();

        assert!(cipher.decrypt("not-valid-base64!@#").is_err());
        assert!(cipher.decrypt(&BASE64.encode(b"short")).is_err());
        assert!(cipher.decrypt(&BASE64.encode(vec![0u8; 50])).is_err());
    }

    #[test]
    fn test_wrong_key_fails_decrypt() {
        let encrypted = test_cipher().encrypt("secret").unwrap();
        let other = SecretCipher::from_key([9u8; KEY_SIZE]);
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(EncryptionError::Decryption(_))
        ));
    }

    #[test]
    fn test_password_encryption_roundtrip() {
        let salt = SecretCipher::generate_salt().unwrap();
        let cipher =
            SecretCipher::with_password("correct horse", &salt, KdfParams::light()).unwrap();
        assert_eq!(cipher.mode(), EncryptionMode::Password);

        let encrypted = cipher.encrypt("refresh-token").unwrap();
        let again =
            SecretCipher::with_password("correct horse", &salt, KdfParams::light()).unwrap();
        assert_eq!(again.decrypt(&encrypted).unwrap(), "refresh-token");
    }

    #[test]
    fn test_password_verification() {
        let salt = SecretCipher::generate_salt().unwrap();
        let hash =
            SecretCipher::hash_password_for_verification("pw-1", &salt, KdfParams::light())
                .unwrap();

        assert!(SecretCipher::verify_password("pw-1", &salt, &hash, KdfParams::light()).unwrap());
        assert!(!SecretCipher::verify_password("pw-2", &salt, &hash, KdfParams::light()).unwrap());

        // The verification hash must never double as the key
        let cipher = SecretCipher::with_password("pw-1", &salt, KdfParams::light()).unwrap();
        assert_ne!(cipher.encryption_key, hash);
    }

    #[test]
    fn test_empty_password_and_bad_salt_fail() {
        let salt = SecretCipher::generate_salt().unwrap();
        assert!(matches!(
            SecretCipher::with_password("", &salt, KdfParams::light()),
            Err(EncryptionError::PasswordRequired)
        ));
        assert!(matches!(
            SecretCipher::with_password("pw", &[0u8; 8], KdfParams::light()),
            Err(EncryptionError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_salt_generation_unique() {
        let salt1 = SecretCipher::generate_salt().unwrap();
        let salt2 = SecretCipher::generate_salt().unwrap();
        assert_eq!(salt1.len(), KEY_SIZE);
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_encryption_mode_from_str() {
        assert_eq!(
            "MACHINE".parse::<EncryptionMode>().unwrap(),
            EncryptionMode::Machine
        );
        assert_eq!(
            "password".parse::<EncryptionMode>().unwrap(),
            EncryptionMode::Password
        );
        assert_eq!(EncryptionMode::Supplied.to_string(), "supplied");
        assert!("invalid".parse::<EncryptionMode>().is_err());
    }
}
