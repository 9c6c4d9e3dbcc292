// ABOUTME: CLI commands for the local connection profile
// ABOUTME: Show the profile or update its display details

use anyhow::bail;
use clap::Subcommand;
use colored::*;
use switchboard_auth::{ConnectionProfile, ProfileUpdate};
use switchboard_cli::App;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the profile and its connected providers
    Show,
    /// Update profile details
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },
}

pub async fn handle_profile_command(app: &App, command: ProfileCommands) -> anyhow::Result<()> {
    match command {
        ProfileCommands::Show => show_profile(app).await,
        ProfileCommands::Set {
            name,
            email,
            avatar,
        } => set_profile(app, ProfileUpdate { name, email, avatar }).await,
    }
}

async fn show_profile(app: &App) -> anyhow::Result<()> {
    match app.orchestrator.profiles().get_profile().await? {
        Some(profile) => {
            print_profile(&profile);
            Ok(())
        }
        None => bail!("No profile found"),
    }
}

async fn set_profile(app: &App, update: ProfileUpdate) -> anyhow::Result<()> {
    if update == ProfileUpdate::default() {
        bail!("Nothing to update. Pass --name, --email, or --avatar.");
    }

    let profile = app.orchestrator.profiles().update_profile_details(update).await?;
    println!("{} Profile updated", "✓".green().bold());
    println!();
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &ConnectionProfile) {
    let unset = || "—".dimmed().to_string();

    println!("{}", "👤 Connection Profile".blue().bold());
    println!("  ID:         {}", profile.id);
    println!(
        "  Name:       {}",
        profile.name.clone().unwrap_or_else(unset)
    );
    println!(
        "  Email:      {}",
        profile.email.clone().unwrap_or_else(unset)
    );
    println!(
        "  Avatar:     {}",
        profile.avatar.clone().unwrap_or_else(unset)
    );
    println!(
        "  Created:    {}",
        profile.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Last login: {}",
        profile
            .last_login
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(unset)
    );

    if profile.connected_providers.is_empty() {
        println!("  Connected:  {}", "none".dimmed());
    } else {
        let names: Vec<&str> = profile
            .connected_providers
            .iter()
            .map(String::as_str)
            .collect();
        println!("  Connected:  {}", names.join(", ").green());
    }
}
