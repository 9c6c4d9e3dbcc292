// ABOUTME: PKCE (Proof Key for Code Exchange) verifier and S256 challenge generation
// ABOUTME: Used by the authorization code flow to bind the code to this client

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

const VERIFIER_LENGTH: usize = 64;

/// Verifier kept locally plus the challenge sent with the authorization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> AuthResult<Self> {
        let code_verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFIER_LENGTH)
            .map(char::from)
            .collect();

        Self::from_verifier(code_verifier)
    }

    /// RFC 7636 requires 43 to 128 characters
    pub fn from_verifier(code_verifier: String) -> AuthResult<Self> {
        if !(43..=128).contains(&code_verifier.len()) {
            return Err(AuthError::Pkce(format!(
                "Invalid code verifier length: {}",
                code_verifier.len()
            )));
        }

        let code_challenge = s256(&code_verifier);
        Ok(Self {
            code_verifier,
            code_challenge,
        })
    }

    pub fn verifies(&self, challenge: &str) -> bool {
        s256(&self.code_verifier) == challenge
    }
}

fn s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
