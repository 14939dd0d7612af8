//! fspec — declarative deployment management for a serverless platform.
//!
//! # Usage
//!
//! ```text
//! fspec init [--specs DIR] [--name NAME]
//! fspec apply [--specs DIR] [--server URL] [--delete]
//! fspec validate [--specs DIR]
//! fspec save | helm        (reserved)
//! ```

mod commands;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{apply::ApplyArgs, init::InitArgs, validate::ValidateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fspec",
    version,
    about = "Manage declarative specs for functions, packages, environments and triggers",
    long_about = None,
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a spec directory with a fresh deployment config.
    Init(InitArgs),

    /// Reconcile the spec directory against the cluster.
    Apply(ApplyArgs),

    /// Parse the spec directory and report dangling references.
    Validate(ValidateArgs),

    /// Write a cluster resource back into the spec directory (reserved).
    Save,

    /// Generate a Helm chart from the spec directory (reserved).
    Helm,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Save => bail!("'save' is not implemented yet"),
        Commands::Helm => bail!("'helm' is not implemented yet"),
    }
}
