//! Wafer-Scout CLI
//!
//! Command-line front end for the steering agent.
//!
//! # Commands
//!
//! - `run`: drive the full closed loop locally against a synthetic signal —
//!   seed measurements, ask, dispatch, measure, tell, repeat — and print the
//!   final report.
//! - `properties`: print the agent's remote-control property table.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// Wafer-Scout - closed-loop steering agent for autonomous measurement
#[derive(Parser)]
#[command(name = "wafer-scout")]
#[command(version = "0.1.0")]
#[command(about = "Closed-loop steering agent for autonomous wafer measurement")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the closed loop against a synthetic signal source
    Run(commands::run::RunArgs),
    /// Print the property table of a freshly configured agent
    Properties(commands::properties::PropertiesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::handle(args).await,
        Commands::Properties(args) => commands::properties::handle(args),
    }
}
