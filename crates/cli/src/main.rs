//! skylog CLI: the main entry point.
//!
//! Commands:
//! - `serve`   start the HTTP API
//! - `ask`     one question, or an interactive session
//! - `ingest`  load parsed flight-log JSON into the database
//! - `tables`  list tables with row counts
//! - `config`  print the effective configuration
//! - `doctor`  diagnose configuration, database and provider

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "skylog",
    about = "skylog: ask questions about UAV flight logs in plain language",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.skylog/config.toml
    #[arg(short, long, global = true, env = "SKYLOG_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask about the loaded flight; interactive when no question is given
    Ask {
        question: Option<String>,

        /// Session to keep history under
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Load a parsed-data JSON file (one batch or an array of batches)
    Ingest { file: PathBuf },

    /// List tables and their row counts
    Tables,

    /// Print the effective configuration (API key redacted)
    Config,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { question, session } => {
            commands::ask::run(config_path, question, session).await?
        }
        Commands::Ingest { file } => commands::ingest::run(config_path, &file).await?,
        Commands::Tables => commands::tables::run(config_path).await?,
        Commands::Config => commands::config_cmd::run(config_path)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
