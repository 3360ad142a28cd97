//! Wizard CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod manifest;

#[derive(Parser)]
#[command(name = "wizard")]
#[command(version)]
#[command(about = "Expand wizard templates into project documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every wizard of a project manifest into one document
    Expand {
        /// Project manifest (TOML)
        manifest: PathBuf,

        /// Write output to FILE (use '--output -' for stdout)
        #[arg(short = 'o', long, default_value = "-")]
        output: String,
    },

    /// Print the first-pass buffer of a project manifest
    Dump {
        /// Project manifest (TOML)
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wizard=info,wizard_template=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Expand { manifest, output } => {
            commands::expand::execute(commands::expand::ExpandArgs { manifest, output })
        }
        Commands::Dump { manifest } => {
            commands::dump::execute(commands::dump::DumpArgs { manifest })
        }
    }
}
