// ABOUTME: CLI commands for connecting, inspecting, and disconnecting providers
// ABOUTME: Thin front end over the auth orchestrator's try_* operations

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use inquire::{Confirm, Password, PasswordDisplayMode, Select};
use switchboard_auth::AuthEventKind;
use switchboard_cli::App;
use switchboard_core::Clock;

use super::utils::{account_label, format_expiry, metadata_from_pairs, status_cell};

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn providers_command(app: &App) -> anyhow::Result<()> {
    let providers = app.orchestrator.registry().list();

    if providers.is_empty() {
        println!("{}", "No providers available".yellow());
        println!(
            "{}",
            "Set <PROVIDER>_CLIENT_ID (and _CLIENT_SECRET) to enable an OAuth provider".dimmed()
        );
        return Ok(());
    }

    println!("{}", "🔌 Available Providers".blue().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Flow", "Refresh", "Revoke"]);

    for info in &providers {
        let caps = info.capabilities;
        let flow = if caps.supports_local_token {
            "local token"
        } else if caps.supports_device_flow {
            "device code"
        } else {
            "browser"
        };

        table.add_row(vec![
            info.name.clone(),
            flow.to_string(),
            yes_no(caps.supports_refresh).to_string(),
            yes_no(caps.supports_revoke).to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn status_command(app: &App) -> anyhow::Result<()> {
    let orchestrator = &app.orchestrator;
    let now = orchestrator.vault().clock().now();

    // Registered providers plus anything connected earlier under a
    // provider that is no longer configured
    let mut names: BTreeSet<String> = orchestrator.registry().names().into_iter().collect();
    names.extend(orchestrator.try_get_connected_providers().await?);

    if names.is_empty() {
        println!("{}", "No providers available or connected".yellow());
        return Ok(());
    }

    println!("{}", "🔐 Connection Status".blue().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Provider", "Status", "Expires", "Scopes"]);

    for name in &names {
        let status = orchestrator.try_get_provider_status(name).await?;
        let token = orchestrator.vault().get_token(name).await?;

        let expires = token
            .as_ref()
            .map(|t| format_expiry(t.expires_at, now))
            .unwrap_or_else(|| "—".to_string());
        let scopes = token
            .and_then(|t| t.scopes)
            .filter(|scopes| !scopes.is_empty())
            .map(|scopes| scopes.join(" "))
            .unwrap_or_else(|| "—".to_string());

        table.add_row(vec![
            comfy_table::Cell::new(name),
            status_cell(status),
            comfy_table::Cell::new(expires),
            comfy_table::Cell::new(scopes),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "Use {} to connect a provider",
        "switchboard connect <provider>".yellow()
    );
    Ok(())
}

fn prompt_provider_selection(app: &App) -> anyhow::Result<String> {
    let choices: Vec<String> = app
        .orchestrator
        .registry()
        .list()
        .into_iter()
        .filter(|info| !info.capabilities.supports_local_token)
        .map(|info| info.name)
        .collect();

    if choices.is_empty() {
        bail!("No OAuth providers are configured");
    }

    Select::new("Select provider to connect:", choices)
        .prompt()
        .map_err(|e| anyhow!("Selection cancelled: {}", e))
}

pub async fn connect_command(app: &App, provider: Option<&str>) -> anyhow::Result<()> {
    let orchestrator = &app.orchestrator;
    let provider = match provider {
        Some(provider) => provider.to_string(),
        None => prompt_provider_selection(app)?,
    };

    let caps = orchestrator.registry().capabilities(&provider).ok_or_else(|| {
        anyhow!(
            "Unknown provider '{}'. Run 'switchboard providers' to see what is available.",
            provider
        )
    })?;
    if caps.supports_local_token {
        bail!(
            "{} uses a long-lived token. Run 'switchboard add-token {}' instead.",
            provider,
            provider
        );
    }

    println!(
        "{}",
        format!("🔐 Connecting {}...", provider).bold().cyan()
    );

    let account = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&account);
    let subscription = orchestrator.on(AuthEventKind::Authenticated, move |event| {
        if let (Some(profile), Ok(mut slot)) = (&event.profile, sink.lock()) {
            *slot = account_label(profile);
        }
        Ok(())
    });
    let result = orchestrator.try_start_auth_flow(&provider).await;
    orchestrator.off(AuthEventKind::Authenticated, subscription);
    let token = result?;

    println!("{} Connected {}", "✓".green().bold(), provider.bold());
    if let Some(label) = account.lock().ok().and_then(|slot| slot.clone()) {
        println!("  Account: {}", label.cyan());
    }
    println!(
        "  Expires: {}",
        format_expiry(token.expires_at, orchestrator.vault().clock().now())
    );
    Ok(())
}

pub async fn add_token_command(
    app: &App,
    provider: &str,
    token: Option<String>,
    meta: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let token = match token {
        Some(token) => token,
        None => Password::new(&format!("Token for {}:", provider))
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()?,
    };

    app.orchestrator
        .try_add_local_token(provider, &token, metadata_from_pairs(meta))
        .await?;

    println!("{} Stored token for {}", "✓".green().bold(), provider.bold());
    Ok(())
}

pub async fn token_command(app: &App, provider: &str) -> anyhow::Result<()> {
    match app.orchestrator.try_get_access_token(provider).await? {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => bail!(
            "{} is not connected. Run 'switchboard connect {}' first.",
            provider,
            provider
        ),
    }
}

pub async fn refresh_command(app: &App, provider: &str) -> anyhow::Result<()> {
    let orchestrator = &app.orchestrator;
    let token = orchestrator.try_refresh_access_token(provider).await?;

    println!("{} Refreshed {}", "✓".green().bold(), provider.bold());
    println!(
        "  Expires: {}",
        format_expiry(token.expires_at, orchestrator.vault().clock().now())
    );
    Ok(())
}

pub async fn disconnect_command(app: &App, provider: &str, yes: bool) -> anyhow::Result<()> {
    let orchestrator = &app.orchestrator;

    if !provider.trim().eq_ignore_ascii_case("all") {
        orchestrator.try_revoke_provider(provider).await?;
        println!("{} Disconnected {}", "✓".green().bold(), provider.bold());
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new("Disconnect every provider?")
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    println!("{}", "🔓 Disconnecting all providers...".bold().cyan());
    let removed = orchestrator.try_reset().await?;
    if removed.is_empty() {
        println!("{}", "Nothing was connected".dimmed());
    }
    for name in &removed {
        println!("  {} {}", "✓".green().bold(), name);
    }
    Ok(())
}
