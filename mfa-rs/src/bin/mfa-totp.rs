//! CLI tool for managing TOTP credentials
//!
//! # Usage
//!
//! ```bash
//! # Validate the [totp] section of a configuration file
//! mfa-totp --config mfa.toml check-config
//!
//! # Enroll a user with a base32 secret
//! mfa-totp enroll alice JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP --digits 8
//!
//! # Show a user's credential or its QR code
//! mfa-totp show alice
//! mfa-totp qr alice --output alice.png
//!
//! # Backup and restore
//! mfa-totp export --output totp.yml
//! mfa-totp import totp.yml
//! ```

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mfa_rs::config::Config;
use mfa_rs::totp::{EnrollmentRequest, TotpConfigurationJson, TotpCredential, TotpStore};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mfa-totp")]
#[command(about = "Manage TOTP second factor credentials", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the TOTP policy and print the registration options
    CheckConfig,
    /// Enroll a user
    Enroll {
        username: String,
        /// Base32 secret shared with the authenticator
        secret: String,
        #[arg(long)]
        algorithm: Option<String>,
        #[arg(long)]
        digits: Option<u32>,
        #[arg(long)]
        period: Option<u32>,
    },
    /// Print a user's credential as JSON
    Show { username: String },
    /// Print a user's enrollment URI
    Uri { username: String },
    /// Write a user's enrollment QR code as PNG
    Qr {
        username: String,
        #[arg(long, default_value_t = 256)]
        width: u32,
        #[arg(long, default_value_t = 256)]
        height: u32,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Check a code and record the sign-in on success
    Verify { username: String, code: String },
    /// Remove a user's credential
    Delete { username: String },
    /// Write all credentials to a YAML backup
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore credentials from a YAML backup
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "mfa_rs=debug" } else { "mfa_rs=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None if std::path::Path::new("config.toml").exists() => Config::from_file("config.toml")?,
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    let (config, errors) = config.validate_totp();
    for e in &errors {
        error!("{}", e);
    }

    if let Commands::CheckConfig = cli.command {
        if !errors.is_empty() {
            bail!("{} TOTP configuration error(s)", errors.len());
        }
        if config.totp.disable {
            warn!("TOTP is disabled");
        }
        println!("{}", serde_json::to_string_pretty(&config.totp.options())?);
        return Ok(());
    }

    if !errors.is_empty() {
        bail!("refusing to continue with an invalid TOTP configuration");
    }

    let pool = SqlitePool::connect(&config.storage.database_url)
        .await
        .with_context(|| format!("opening {}", config.storage.database_url))?;
    let store = TotpStore::new(pool);
    store.init_db().await?;

    match cli.command {
        Commands::CheckConfig => unreachable!("handled above"),
        Commands::Enroll {
            username,
            secret,
            algorithm,
            digits,
            period,
        } => {
            if store.load(&username).await?.is_some() {
                bail!("user {} already has a TOTP configuration", username);
            }

            let request = EnrollmentRequest {
                algorithm,
                digits,
                period,
            };
            let mut credential =
                TotpCredential::enroll(&config.totp, &username, &request, secret.into_bytes(), Utc::now())?;
            credential.key()?;

            store.save(&mut credential).await?;
            println!("{}", credential.uri());
        }
        Commands::Show { username } => {
            let credential = require(&store, &username).await?;
            let view = TotpConfigurationJson::from(&credential);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Uri { username } => {
            let credential = require(&store, &username).await?;
            println!("{}", credential.uri());
        }
        Commands::Qr {
            username,
            width,
            height,
            output,
        } => {
            let credential = require(&store, &username).await?;
            std::fs::write(&output, credential.image(width, height)?)?;
            println!("✓ QR code written to {}", output.display());
        }
        Commands::Verify { username, code } => {
            let mut credential = require(&store, &username).await?;
            let now = Utc::now();

            if !credential.verify_code(&code, now, config.totp.skew())? {
                println!("✗ Invalid code");
                std::process::exit(1);
            }

            credential.update_sign_in_info(now);
            store.update_sign_in_info(&credential).await?;
            println!("✓ Code accepted");
        }
        Commands::Delete { username } => {
            if !store.delete(&username).await? {
                bail!("user {} has no TOTP configuration", username);
            }
            println!("✓ TOTP configuration of {} deleted", username);
        }
        Commands::Export { output } => {
            let yaml = store.export_yaml().await?;
            match output {
                Some(path) => std::fs::write(path, yaml)?,
                None => print!("{}", yaml),
            }
        }
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let count = store.import_yaml(&content).await?;
            println!("✓ Imported {} TOTP configuration(s)", count);
        }
    }

    Ok(())
}

async fn require(store: &TotpStore, username: &str) -> anyhow::Result<TotpCredential> {
    store
        .load(username)
        .await?
        .with_context(|| format!("user {} has no TOTP configuration", username))
}
