//! Command Line Interface
//!
//! Identity inspection and screen pairing for a display agent.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use mp_core::{
    load_settings, AgentSettings, FileStore, HostProbe, HttpPairingApi, IdentityStore,
    OutcomeDisplay, PairingSession,
};

#[derive(Parser)]
#[command(name = "menupi-agent")]
#[command(version)]
#[command(about = "Menupi display agent - device identity and screen pairing")]
#[command(long_about = "Menupi display agent - device identity and screen pairing

EXAMPLES:
    menupi-agent identity                 Show device uid and installation id
    menupi-agent identity --json          Same, as JSON
    menupi-agent screens                  List screens available for pairing
    menupi-agent pair --code 1A2B3C       Pair using a code shown in the dashboard
    menupi-agent pair --screen scr_42     Pair to a specific screen
    menupi-agent reset-installation       Forget the installation id

ENVIRONMENT VARIABLES:
    RUST_LOG=debug                Enable debug logging
    MENUPI_API_URL=<url>          Override the backend URL
    MENUPI_SESSION_COOKIE=<c>     Session cookie for screen listing and pairing

FILES:
    ~/.config/menupi/settings.json   Agent settings
    ~/.config/menupi/storage.json    Persisted identities")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Backend URL (overrides settings and environment)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show this device's identities
    Identity {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List screens available for explicit selection
    Screens,

    /// Pair this device with a screen
    Pair(PairArgs),

    /// Forget the installation id; the device uid is kept
    ResetInstallation,
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["code", "screen"])))]
pub struct PairArgs {
    /// Pairing code shown in the dashboard (case-insensitive)
    #[arg(long)]
    pub code: Option<String>,

    /// Screen id to pair with
    #[arg(long)]
    pub screen: Option<String>,

    /// Identity token to send instead of the device uid
    #[arg(long)]
    pub device_id: Option<String>,
}

fn settings_for(cli: &Cli) -> Result<AgentSettings> {
    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(url) = &cli.api_url {
        settings.api_base_url = url.clone();
        settings.validate()?;
    }
    debug!(api = %settings.api_base_url, "Settings loaded");
    Ok(settings)
}

fn identity_store(settings: &AgentSettings) -> Result<IdentityStore<FileStore, HostProbe>> {
    let path = settings.resolved_store_path()?;
    Ok(IdentityStore::new(FileStore::new(path), HostProbe::new()))
}

/// Run a command; `Ok(true)` means the device ended up paired or the command succeeded
pub async fn run(cli: &Cli) -> Result<bool> {
    let settings = settings_for(cli)?;

    match &cli.command {
        Commands::Identity { json } => {
            let ids = identity_store(&settings)?;
            let identity = ids.identity();
            if *json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                println!("device_uid:      {}", identity.device_uid);
                println!("installation_id: {}", identity.installation_id);
                if identity.device_uid.is_fallback() {
                    println!("warning: device uid is a session fallback and will not be stable");
                }
            }
            Ok(true)
        }

        Commands::Screens => {
            let session = PairingSession::new(HttpPairingApi::from_settings(&settings)?);
            let screens = session.load_screens().await?;
            if screens.is_empty() {
                println!("No screens available");
            }
            for screen in screens {
                println!("{:<24} {}", screen.id, screen.name);
            }
            Ok(true)
        }

        Commands::Pair(args) => {
            let ids = identity_store(&settings)?;
            let api = HttpPairingApi::from_settings(&settings)?;
            let session = PairingSession::new(api).with_installation_id(ids.installation_id());

            session.select_screen(args.screen.as_deref());
            if let Some(code) = &args.code {
                session.set_code(code);
            }
            if !session.can_submit() {
                bail!("a non-empty --code or --screen is required");
            }

            let device_id = match &args.device_id {
                Some(token) => token.clone(),
                None => ids.device_uid().into_string(),
            };
            let outcome = session.submit(&device_id).await?;

            match outcome.display() {
                OutcomeDisplay::Connected { prefix, screen_name } => {
                    println!("{}\x1b[1m{}\x1b[0m", prefix, screen_name)
                }
                OutcomeDisplay::Plain(message) => println!("{}", message),
                OutcomeDisplay::Error(message) => eprintln!("\x1b[31m{}\x1b[0m", message),
            }
            Ok(outcome.success)
        }

        Commands::ResetInstallation => {
            let ids = identity_store(&settings)?;
            ids.reset_installation();
            println!("installation id cleared; new id: {}", ids.installation_id());
            Ok(true)
        }
    }
}
