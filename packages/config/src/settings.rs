use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use switchboard_core::{switchboard_dir, DEFAULT_CALLBACK_PORT};

use crate::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid number for {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("Callback port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
}

/// Runtime settings for the connection manager
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub store_password: Option<String>,
    pub callback_port: u16,
    pub callback_timeout: Duration,
    pub http_timeout: Duration,
    pub open_browser: bool,
    pub profile_id: String,
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (the process environment in
    /// production, a map in tests)
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = non_empty(SWITCHBOARD_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(switchboard_dir);

        let database_path = non_empty(SWITCHBOARD_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("switchboard.db"));

        let callback_port = match non_empty(SWITCHBOARD_CALLBACK_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: SWITCHBOARD_CALLBACK_PORT,
                    source,
                })?,
            None => DEFAULT_CALLBACK_PORT,
        };

        // Validate port is in valid range
        if callback_port == 0 {
            return Err(ConfigError::PortOutOfRange(callback_port));
        }

        let callback_timeout = parse_secs(
            non_empty(SWITCHBOARD_CALLBACK_TIMEOUT_SECS),
            SWITCHBOARD_CALLBACK_TIMEOUT_SECS,
            300,
        )?;
        let http_timeout = parse_secs(
            non_empty(SWITCHBOARD_HTTP_TIMEOUT_SECS),
            SWITCHBOARD_HTTP_TIMEOUT_SECS,
            30,
        )?;

        let open_browser = match non_empty(SWITCHBOARD_OPEN_BROWSER) {
            Some(raw) => parse_bool(&raw, SWITCHBOARD_OPEN_BROWSER)?,
            None => true,
        };

        let profile_id =
            non_empty(SWITCHBOARD_PROFILE_ID).unwrap_or_else(|| "local-user".to_string());

        let settings = Settings {
            data_dir,
            database_path,
            store_password: non_empty(SWITCHBOARD_STORE_PASSWORD),
            callback_port,
            callback_timeout,
            http_timeout,
            open_browser,
            profile_id,
            log_filter: non_empty(SWITCHBOARD_LOG).or_else(|| non_empty(RUST_LOG)),
        };

        debug!(
            "Loaded settings: database={}, callback_port={}",
            settings.database_path.display(),
            settings.callback_port
        );
        Ok(settings)
    }
}

fn parse_secs(
    raw: Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|source| ConfigError::InvalidNumber { name, source })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::ZeroDuration { name });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(raw: &str, name: &'static str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}

/// OAuth client credentials for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    /// Read `<PREFIX>_CLIENT_ID` and `<PREFIX>_CLIENT_SECRET` from the environment
    pub fn from_env(env_prefix: &str) -> Option<Self> {
        Self::from_source(env_prefix, |key| env::var(key).ok())
    }

    pub fn from_source<F>(env_prefix: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            lookup(&format!("{}{}", env_prefix, suffix)).filter(|v| !v.trim().is_empty())
        };

        let client_id = read(CLIENT_ID_SUFFIX)?;
        Some(Self {
            client_id,
            client_secret: read(CLIENT_SECRET_SUFFIX),
        })
    }
}
