// ABOUTME: Encryption for values written to the Switchboard secure store
// ABOUTME: ChaCha20-Poly1305 with machine-derived or password-derived keys

pub mod encryption;

pub use encryption::{EncryptionError, EncryptionMode, KdfParams, SecretCipher};
