//! # FamilyCircles CLI (`fc`)
//!
//! Serves the FamilyCircles JSON API and exposes the same lookups on the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! fc --config ./config/fc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fc serve` | Start the HTTP server |
//! | `fc get <tree> <id>` | Print an individual or family projection |
//! | `fc search <tree> "<query>"` | Print search results |
//! | `fc terms "<query>"` | Print the search terms a query expands to |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use family_circles::{config, get, search, server, terms};

/// FamilyCircles: a JSON read API over a genealogy host.
#[derive(Parser)]
#[command(
    name = "fc",
    about = "FamilyCircles: JSON config, record, and search endpoints over family trees",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the records in `[data].snapshot`.
    Serve,

    /// Print the projection of one record.
    Get {
        /// Tree name.
        tree: String,
        /// Record xref (`I...` or `F...`).
        id: String,
    },

    /// Search a tree.
    Search {
        /// Tree name.
        tree: String,
        /// Free-text query. Quote phrases to keep them together.
        query: String,
    },

    /// Show how a query is split into search terms.
    Terms {
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Terms { query } = &cli.command {
        let terms = terms::extract_search_terms(query);
        println!("{}", serde_json::to_string(&terms)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Get { tree, id } => {
            get::run_get(&cfg, &tree, &id).await?;
        }
        Commands::Search { tree, query } => {
            search::run_search(&cfg, &tree, &query).await?;
        }
        Commands::Terms { .. } => unreachable!(),
    }

    Ok(())
}
