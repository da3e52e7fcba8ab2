//! Tideline: replay recorded client sessions through the engine
//!
//! Main binary with subcommands:
//! - `replay`: Apply a JSON-lines event log and print the resulting state
//! - `check-config`: Validate an engine configuration file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod replay;

#[derive(Parser)]
#[command(name = "tideline")]
#[command(about = "Feed reconciliation engine replay tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a recorded event log and print the resulting snapshot
    Replay {
        /// JSON-lines file of events
        events: PathBuf,

        /// Engine configuration file (JSON)
        #[arg(long, env = "TIDELINE_CONFIG")]
        config: Option<PathBuf>,

        /// Only print these feeds (repeatable)
        #[arg(long = "feed")]
        feeds: Vec<String>,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Engine configuration file (JSON)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tideline=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            events,
            config,
            feeds,
        } => {
            let config = match config {
                Some(path) => replay::load_config(&path).await?,
                None => Default::default(),
            };
            let snapshot = replay::run(&events, config, &feeds).await?;
            let rendered = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| miette::miette!("failed to render snapshot: {}", e))?;
            println!("{rendered}");
            Ok(())
        }

        Commands::CheckConfig { path } => {
            let config = replay::load_config(&path).await?;
            println!(
                "ok: truncate {}/{}, queue cap {}, default overflow {:?}",
                config.truncate_limit,
                config.truncate_size,
                config.max_queued_items,
                config.overflow.default
            );
            for (feed, policy) in &config.overflow.feeds {
                println!("  {feed}: {policy:?}");
            }
            Ok(())
        }
    }
}
