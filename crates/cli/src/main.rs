//! clawcraft CLI — the main entry point.
//!
//! Commands:
//! - `init`   — Write a default config file
//! - `run`    — Start the agent loop
//! - `status` — Show configuration and storage stats
//! - `doctor` — Diagnose configuration and storage health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "clawcraft",
    about = "clawcraft — an autonomous LLM-driven game agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (default: ~/.clawcraft/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Start the agent loop
    Run,

    /// Show configuration and storage stats
    Status,

    /// Diagnose configuration and storage health
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Init => commands::init::run(cli.config).await,
        Commands::Run => commands::run::run(cli.config).await,
        Commands::Status => commands::status::run(cli.config).await,
        Commands::Doctor => commands::doctor::run(cli.config).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
