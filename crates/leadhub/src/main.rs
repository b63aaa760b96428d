// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadhub - WhatsApp inbound ingestion and conversation distribution.
//!
//! This is the binary entry point for the Leadhub service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod assign;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leadhub_config::model::LeadhubConfig;

/// Leadhub - WhatsApp inbound ingestion and conversation distribution.
#[derive(Parser, Debug)]
#[command(name = "leadhub", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook receiver, REST API and realtime gateway.
    Serve,
    /// Assign every queued conversation and eligible lead, then exit.
    AssignAll,
    /// Validate configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> LeadhubConfig {
    let loaded = match path {
        Some(path) => leadhub_config::load_and_validate_path(path),
        None => leadhub_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            leadhub_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::AssignAll) => assign::run_assign_all(config).await,
        Some(Commands::CheckConfig) => {
            println!(
                "leadhub: config ok (service.name={}, database={})",
                config.service.name, config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("leadhub: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
