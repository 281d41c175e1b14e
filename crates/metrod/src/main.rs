//! metrod - metric routing daemon
//!
//! Accepts Graphite plaintext records over TCP and UDP, rewrites and routes
//! them by regex rules, and relays them to clusters of downstream hosts.
//!
//! # Usage
//!
//! ```bash
//! # Run the relay
//! metrod --config metro.toml
//!
//! # Validate config, rules and clusters without starting
//! metrod check --config metro.toml
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// metrod - metric routing daemon
#[derive(Parser, Debug)]
#[command(name = "metrod")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the main configuration file
    #[arg(short, long, default_value = "metro.toml", global = true)]
    config: std::path::PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay (default when no subcommand is given)
    Serve,

    /// Validate config, rules and clusters, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => cmd::serve::run(cli.config, cli.log_level).await,
        Command::Check => cmd::check::run(cli.config),
    }
}
