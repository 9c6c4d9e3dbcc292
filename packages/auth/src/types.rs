// ABOUTME: Core type definitions for the token lifecycle
// ABOUTME: Token records, provider grants, capability descriptors, and connection status

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::REFRESH_BUFFER_SECS;

/// Provider-specific extras stored alongside a token (workspace id, base URL, ...)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Token record persisted per provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Absolute expiry, serialized as epoch milliseconds
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Raw scope string as granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TokenRecord {
    /// Minimal record holding only an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            expires_at: None,
            token_type: None,
            scope: None,
            scopes: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Fill in derived fields.
    ///
    /// `expires_at` is computed from `expires_in` when absent, and `scopes`
    /// is split out of `scope` when absent. A lifetime too large to add to
    /// `now` leaves `expires_at` unset.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in {
                // A lifetime past the representable range means no expiry
                self.expires_at = Duration::try_seconds(expires_in)
                    .and_then(|lifetime| now.checked_add_signed(lifetime));
            }
        }

        if self.scopes.is_none() {
            if let Some(scope) = &self.scope {
                self.scopes = Some(split_scopes(scope));
            }
        }
    }

    /// Expired, or within the refresh buffer of expiring.
    /// Records without an absolute expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at < now + Duration::seconds(REFRESH_BUFFER_SECS),
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Record replacing `previous` after a refresh.
    ///
    /// The previous refresh token and metadata survive when the provider
    /// does not send new ones.
    pub fn refreshed(previous: &TokenRecord, grant: AuthGrant) -> Self {
        let mut record = TokenRecord::from(grant);
        if record.refresh_token.is_none() {
            record.refresh_token = previous.refresh_token.clone();
        }
        if record.metadata.is_none() {
            record.metadata = previous.metadata.clone();
        }
        record
    }
}

impl From<AuthGrant> for TokenRecord {
    fn from(grant: AuthGrant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in: grant.expires_in,
            expires_at: grant.expires_at,
            token_type: grant.token_type,
            scope: grant.scope,
            scopes: grant.scopes,
            metadata: None,
        }
    }
}

/// Split a raw scope string on whitespace, dropping empties
pub fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// What a provider hands back from a successful flow or refresh.
///
/// Deserializes directly from a standard OAuth token endpoint response.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(skip)]
    pub scopes: Option<Vec<String>>,
    /// Account details the provider returned alongside the token
    #[serde(skip)]
    pub profile: Option<serde_json::Value>,
}

impl AuthGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

/// What a provider plug-in is able to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderCapabilities {
    pub supports_refresh: bool,
    pub supports_revoke: bool,
    pub supports_device_flow: bool,
    pub supports_local_token: bool,
}

/// Connection status of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// No token stored
    Disconnected,
    /// Token expired and cannot be refreshed
    NeedsReauth,
    Connected,
}

impl ProviderStatus {
    pub fn classify(record: Option<&TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self::Disconnected,
            Some(record) if record.is_expired_at(now) && !record.can_refresh() => {
                Self::NeedsReauth
            }
            Some(_) => Self::Connected,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::NeedsReauth => write!(f, "needs_reauth"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
