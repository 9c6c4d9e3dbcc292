// ABOUTME: Configuration for Switchboard loaded from environment variables
// ABOUTME: Exposes env var names and the typed Settings used by the composition root

pub mod constants;
pub mod settings;

pub use settings::{ClientCredentials, ConfigError, Settings};
