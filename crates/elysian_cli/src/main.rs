//! ElysianDB CLI
//!
//! Command-line tools for ElysianDB data folders.
//!
//! # Commands
//!
//! - `inspect` - Display snapshot, recovery log and entity statistics
//! - `list` - List documents using HTTP-style query parameters
//! - `dump` - Export every document as JSON
//! - `import` - Load documents from a JSON dump
//! - `flush` - Replay pending recovery logs into the snapshots
//! - `reset` - Delete every document, index and entity type

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ElysianDB command-line tools.
#[derive(Parser)]
#[command(name = "elysiandb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data folder
    #[arg(global = true, short, long)]
    folder: Option<PathBuf>,

    /// TOML configuration file; `--folder` overrides its data folder
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display data folder statistics
    Inspect {
        /// List entity types with their document counts
        #[arg(short, long)]
        types: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List documents of one entity type
    List {
        /// Entity type
        entity: String,

        /// Query parameters such as `filter[price][gt]=10`, `sort[price]=desc`,
        /// `limit=5`, `offset=10`, `search=dune`, `includes=author`,
        /// `fields=title,price` or `countOnly=true`
        params: Vec<String>,
    },

    /// Export every document as JSON, grouped by entity type
    Dump {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the JSON on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Import a JSON dump produced by `dump`
    Import {
        /// Dump file
        input: PathBuf,
    },

    /// Replay pending recovery logs and write fresh snapshots
    Flush,

    /// Delete every document, index and entity type
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let target = commands::Target::new(cli.folder, cli.config);

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = target.config().map_or_else(|_| "info".to_string(), |c| c.log.level);
            EnvFilter::new(level)
        })
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { types, format } => {
            commands::inspect::run(&target, types, &format)?;
        }
        Commands::List { entity, params } => {
            commands::list::run(&target, &entity, &params)?;
        }
        Commands::Dump { output, compact } => {
            commands::dump::run(&target, output.as_deref(), !compact)?;
        }
        Commands::Import { input } => {
            commands::import::run(&target, &input)?;
        }
        Commands::Flush => {
            commands::flush::run(&target)?;
        }
        Commands::Reset { yes } => {
            if !yes {
                return Err("refusing to reset without --yes".into());
            }
            commands::reset::run(&target)?;
        }
        Commands::Version => {
            println!("ElysianDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ElysianDB Core v{}", elysian_core::VERSION);
        }
    }

    Ok(())
}
