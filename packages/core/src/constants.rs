use std::env;
use std::path::PathBuf;

/// Prefix of every secure-store key holding a provider token record
pub const TOKEN_KEY_PREFIX: &str = "auth_token_";

/// Secure-store key of the single local connection profile
pub const PROFILE_KEY: &str = "master_profile";

/// Tokens are treated as expired this many seconds before `expires_at`
pub const REFRESH_BUFFER_SECS: i64 = 5 * 60;

/// Default loopback port for OAuth redirects
pub const DEFAULT_CALLBACK_PORT: u16 = 3737;

/// Get the path to the Switchboard directory (~/.switchboard)
pub fn switchboard_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".switchboard")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".switchboard")
    }
}

/// Get the path to the secure store database (~/.switchboard/switchboard.db)
pub fn database_file() -> PathBuf {
    switchboard_dir().join("switchboard.db")
}
