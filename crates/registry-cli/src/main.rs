//! Creator profile registry - command-line client.
//!
//! ```bash
//! # List verified profiles
//! registry-cli list --status verified
//!
//! # Submit a profile
//! registry-cli create --category Artist --revenue 1200.5 --rating 4.5 --owner 0xabc...
//!
//! # Reveal a profile's values (signs the session challenge)
//! registry-cli decrypt 1700000000000-k3j9x2a
//! ```

mod commands;
mod config;

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_client::{HttpLedger, Ledger};
use profile_registry::{Ed25519Signer, Registry, Status};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Creator profile registry client
#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(version)]
#[command(about = "Creator profile registry client")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List profiles, newest first
    List {
        /// Only show profiles with this status
        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Show profile counts per status
    Stats,

    /// Show one profile
    Show {
        /// Profile id
        id: String,
    },

    /// Submit a new profile
    Create {
        #[arg(long)]
        category: String,
        #[arg(long)]
        revenue: f64,
        #[arg(long)]
        rating: f64,
        /// Owner address
        #[arg(long)]
        owner: String,
    },

    /// Mark a pending profile verified
    Verify {
        id: String,
        /// Address making the change; must own the profile
        #[arg(long)]
        caller: String,
    },

    /// Mark a pending profile rejected
    Reject {
        id: String,
        /// Address making the change; must own the profile
        #[arg(long)]
        caller: String,
    },

    /// Re-run the index append for a stored but unlisted profile
    Reindex { id: String },

    /// Sign the session challenge and reveal a profile's values
    Decrypt { id: String },

    /// Print the decryption challenge
    Challenge {
        /// Bind the challenge to this profile's tokens
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.log.level);

    let ledger = Arc::new(
        HttpLedger::new(&config.ledger.url, config.ledger.timeout)
            .context("Failed to create ledger client")?,
    );

    if !ledger.is_available().await {
        warn!("Ledger at {} reports unavailable", config.ledger.url);
    }

    let registry = Registry::connect(ledger, &config.registry)
        .await
        .context("Failed to connect registry")?;

    let signer = match &config.signer.key {
        Some(key) => Ed25519Signer::from_hex(key.expose_secret())
            .context("Invalid SIGNER__KEY")?,
        None => {
            info!("No signing key configured, using a throwaway key");
            Ed25519Signer::generate()
        }
    };

    let out = commands::Output { json: cli.json };

    match cli.command {
        Commands::List { status } => commands::list(&registry, status, out).await,
        Commands::Stats => commands::stats(&registry, out).await,
        Commands::Show { id } => commands::show(&registry, &id, out).await,
        Commands::Create {
            category,
            revenue,
            rating,
            owner,
        } => commands::create(&registry, category, revenue, rating, owner, out).await,
        Commands::Verify { id, caller } => {
            commands::set_status(&registry, &id, Status::Verified, &caller, out).await
        }
        Commands::Reject { id, caller } => {
            commands::set_status(&registry, &id, Status::Rejected, &caller, out).await
        }
        Commands::Reindex { id } => commands::reindex(&registry, &id).await,
        Commands::Decrypt { id } => commands::decrypt(&registry, &id, &signer, out).await,
        Commands::Challenge { id } => {
            commands::challenge(&registry, id.as_deref(), &signer).await
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
