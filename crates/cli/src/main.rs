//! storesync - refresh managed stores from the Admin API.
//!
//! # Usage
//!
//! ```bash
//! # Refresh every installed store inline, with order counts
//! storesync update-stores --order-count
//!
//! # Refresh two stores touched since New Year, via the `bulk` queue
//! storesync update-stores --store-ids 5,9 --updated-at-min 2024-01-01 --connection bulk
//!
//! # Work the `bulk` queue until it is empty
//! storesync work --connection bulk --once
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod wiring;

#[derive(Parser)]
#[command(name = "storesync")]
#[command(author, version, about = "Store synchronisation jobs")]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh shop details and counters for the selected stores
    UpdateStores(commands::update_stores::Args),
    /// Run a queue worker
    Work(commands::work::Args),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    storesync_observability::init_with(if cli.pretty {
        storesync_observability::LogFormat::Pretty
    } else {
        storesync_observability::LogFormat::Json
    });

    let result = match cli.command {
        Commands::UpdateStores(args) => commands::update_stores::run(args),
        Commands::Work(args) => commands::work::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(error = %error, "command failed");
            ExitCode::FAILURE
        }
    }
}
