// ABOUTME: Formatting and argument parsing helpers shared by CLI commands
// ABOUTME: Expiry rendering, status labels, and key=value metadata parsing

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color};
use serde_json::Value;
use switchboard_auth::{Metadata, ProviderStatus};

/// Parse a `key=value` argument
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn metadata_from_pairs(pairs: Vec<(String, String)>) -> Option<Metadata> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

/// Colored table cell for a provider status
pub fn status_cell(status: ProviderStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        ProviderStatus::Connected => cell.fg(Color::Green),
        ProviderStatus::NeedsReauth => cell.fg(Color::Yellow),
        ProviderStatus::Disconnected => cell.fg(Color::DarkGrey),
    }
}

/// Best human-readable label in a provider's account details
pub fn account_label(account: &Value) -> Option<String> {
    ["name", "display_name", "login", "username", "email"]
        .iter()
        .find_map(|key| account.get(key).and_then(Value::as_str))
        .filter(|label| !label.trim().is_empty())
        .map(str::to_string)
}

pub fn format_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(expires_at) = expires_at else {
        return "never".to_string();
    };

    let formatted = expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    if expires_at <= now {
        format!("{} (expired)", formatted)
    } else {
        let remaining = expires_at - now;
        if remaining.num_hours() >= 1 {
            format!("{} (in {}h)", formatted, remaining.num_hours())
        } else {
            format!("{} (in {}m)", formatted, remaining.num_minutes())
        }
    }
}
