//! Cooldown CLI - cooldown command

use clap::{Parser, Subcommand};
use anyhow::Result;
use cli_lib::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Cooldown - debounced write-back from stdin into an embedded store
#[derive(Parser)]
#[command(name = "cooldown")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides the settings file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read key=value lines from stdin and persist them with a cooldown
    Run {
        /// Cooldown in milliseconds (overrides the settings file)
        #[arg(long)]
        cooldown_ms: Option<u64>,
    },
    /// Show persisted entries
    Dump {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is for dump output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.store.path = db;
    }

    match cli.command {
        Commands::Run { cooldown_ms } => {
            if let Some(cooldown_ms) = cooldown_ms {
                settings.cache.cooldown_ms = cooldown_ms;
                settings.cache.validate()?;
            }
            cmd::run::run(settings).await
        }
        Commands::Dump { json } => cmd::dump::run(&settings, json),
    }
}
