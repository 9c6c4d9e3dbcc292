// ABOUTME: Secure-store key helpers shared by the token vault and key stores
// ABOUTME: Maps provider names to `auth_token_<provider>` keys and back

use crate::constants::TOKEN_KEY_PREFIX;

/// Build the secure-store key for a provider's token record
pub fn token_key(provider: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, provider)
}

/// Extract the provider name from a token key, if the key is one
pub fn provider_from_token_key(key: &str) -> Option<&str> {
    key.strip_prefix(TOKEN_KEY_PREFIX)
        .filter(|provider| !provider.is_empty())
}
