// ABOUTME: Core constants, clock abstraction, and path helpers for Switchboard
// ABOUTME: Foundational package shared by storage, auth, and the CLI

pub mod clock;
pub mod constants;
pub mod utils;

// Re-export clock types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// Re-export constants
pub use constants::{
    database_file, switchboard_dir, DEFAULT_CALLBACK_PORT, PROFILE_KEY, REFRESH_BUFFER_SECS,
    TOKEN_KEY_PREFIX,
};

// Re-export utilities
pub use utils::{provider_from_token_key, token_key};
