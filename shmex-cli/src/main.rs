// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmex CLI
//!
//! Producer and consumer entry points for exchanging data through a named
//! shared-memory region, plus operator commands to inspect and remove it.

use std::path::Path;

use clap::{Parser, Subcommand};
use shmex_core::{Capacity, Config, ConfigLoader, RegionName};

mod commands;

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "shmex.yaml";

/// Bearer token published by `produce` when none is given.
const DEFAULT_BEARER: &str = "bearer ... from producer";

/// shmex - Named shared-memory exchange
#[derive(Parser)]
#[command(name = "shmex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults to ./shmex.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Region name, overrides the configuration
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Region payload capacity in bytes, overrides the configuration
    #[arg(long, global = true)]
    pub capacity: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or attach to the region and publish a payload
    Produce {
        /// Bearer token published as an Auth record
        #[arg(short, long, default_value = DEFAULT_BEARER)]
        bearer: String,

        /// Publish raw text instead of an Auth record
        #[arg(short, long, conflicts_with = "bearer")]
        text: Option<String>,

        /// Keep running until Ctrl-C, then remove the region
        #[arg(long)]
        hold: bool,
    },

    /// Read the region as an Auth record and as raw text
    Consume {
        /// Only print the raw text
        #[arg(short, long)]
        raw: bool,

        /// Wait up to this many milliseconds for a complete payload
        #[arg(short, long)]
        wait_ms: Option<u64>,
    },

    /// Show the region's frame header
    Inspect,

    /// Remove the region
    Remove,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

/// Resolve the effective configuration: file (or built-in defaults), then flags.
fn resolve_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ConfigLoader::load_file(DEFAULT_CONFIG_FILE)?
        }
        None => ConfigLoader::defaults()?,
    };

    if let Some(name) = &cli.name {
        config.region.name = RegionName::new(name.as_str())?;
    }
    if let Some(capacity) = cli.capacity {
        config.region.capacity = Capacity::new(capacity)?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Validate works on its own file argument
    if let Commands::Validate { file } = &cli.command {
        return commands::validate::execute(file).await;
    }

    let config = resolve_config(&cli)?;
    tracing::debug!(
        name = %config.region.name,
        capacity = config.region.capacity.bytes(),
        "Resolved region configuration"
    );

    // Dispatch to command handlers
    match cli.command {
        Commands::Produce { bearer, text, hold } => {
            commands::produce::execute(&config, &bearer, text.as_deref(), hold).await
        }
        Commands::Consume { raw, wait_ms } => {
            commands::consume::execute(&config, raw, wait_ms).await
        }
        Commands::Inspect => commands::inspect::execute(&config).await,
        Commands::Remove => commands::remove::execute(&config).await,
        Commands::Validate { .. } => Ok(()),
    }
}
