use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::profile::ProfileCommands;
use switchboard_cli::{init_tracing, App};
use switchboard_config::Settings;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard - connect and manage third-party accounts")]
#[command(version)]
struct Cli {
    /// Log filter directives (overrides SWITCHBOARD_LOG and RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the providers available in this environment
    Providers,
    /// Show the connection status of every provider
    Status,
    /// Connect a provider through its browser or device flow
    Connect {
        /// Provider to connect (prompts when omitted)
        provider: Option<String>,
    },
    /// Store a long-lived token for a provider (e.g. Home Assistant)
    AddToken {
        provider: String,

        /// Token value (prompts when omitted)
        token: Option<String>,

        /// Metadata to keep with the token, as key=value
        #[arg(long = "meta", value_parser = cli::utils::parse_key_val)]
        meta: Vec<(String, String)>,
    },
    /// Print a valid access token, refreshing it first if it is about to expire
    Token { provider: String },
    /// Refresh a provider's token now
    Refresh { provider: String },
    /// Disconnect a provider, or every provider with `all`
    Disconnect {
        /// Provider to disconnect, or `all`
        provider: String,

        /// Skip the confirmation prompt for `all`
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show or edit the connection profile
    #[command(subcommand)]
    Profile(ProfileCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };
    init_tracing(cli.log.as_deref().or(settings.log_filter.as_deref()));

    let app = match App::open(settings).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = handle_command(&app, cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Providers => cli::connections::providers_command(app),
        Commands::Status => cli::connections::status_command(app).await,
        Commands::Connect { provider } => {
            cli::connections::connect_command(app, provider.as_deref()).await
        }
        Commands::AddToken {
            provider,
            token,
            meta,
        } => cli::connections::add_token_command(app, &provider, token, meta).await,
        Commands::Token { provider } => cli::connections::token_command(app, &provider).await,
        Commands::Refresh { provider } => cli::connections::refresh_command(app, &provider).await,
        Commands::Disconnect { provider, yes } => {
            cli::connections::disconnect_command(app, &provider, yes).await
        }
        Commands::Profile(profile_cmd) => cli::profile::handle_profile_command(app, profile_cmd).await,
    }
}
