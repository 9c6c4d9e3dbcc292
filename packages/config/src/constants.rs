// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Switchboard

// Storage Configuration
pub const SWITCHBOARD_DATA_DIR: &str = "SWITCHBOARD_DATA_DIR";
pub const SWITCHBOARD_DB_PATH: &str = "SWITCHBOARD_DB_PATH";
pub const SWITCHBOARD_STORE_PASSWORD: &str = "SWITCHBOARD_STORE_PASSWORD";

// OAuth Flow Configuration
pub const SWITCHBOARD_CALLBACK_PORT: &str = "SWITCHBOARD_CALLBACK_PORT";
pub const SWITCHBOARD_CALLBACK_TIMEOUT_SECS: &str = "SWITCHBOARD_CALLBACK_TIMEOUT_SECS";
pub const SWITCHBOARD_HTTP_TIMEOUT_SECS: &str = "SWITCHBOARD_HTTP_TIMEOUT_SECS";
pub const SWITCHBOARD_OPEN_BROWSER: &str = "SWITCHBOARD_OPEN_BROWSER";

// Profile
pub const SWITCHBOARD_PROFILE_ID: &str = "SWITCHBOARD_PROFILE_ID";

// Logging
pub const SWITCHBOARD_LOG: &str = "SWITCHBOARD_LOG";
pub const RUST_LOG: &str = "RUST_LOG";

// Per-provider OAuth client credentials are read from
// `<PROVIDER>_CLIENT_ID` / `<PROVIDER>_CLIENT_SECRET`
pub const CLIENT_ID_SUFFIX: &str = "_CLIENT_ID";
pub const CLIENT_SECRET_SUFFIX: &str = "_CLIENT_SECRET";

// System Environment Variables
pub const HOME: &str = "HOME";
pub const USERPROFILE: &str = "USERPROFILE"; // Windows
