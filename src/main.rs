//! # ultradoc CLI (`udi`)
//!
//! ## Usage
//!
//! ```bash
//! udi --config ./config/udi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `udi serve` | Start the HTTP API |
//! | `udi ingest <files…>` | Copy documents into the upload directory and rebuild the index |
//! | `udi ask "<question>"` | Answer a question from the uploaded documents |
//! | `udi extract` | Print the structured shipment fields |
//! | `udi index-info` | Describe the persisted index snapshot |
//!
//! Every command prints pretty JSON on stdout. Logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ultradoc::config;
use ultradoc::server;
use ultradoc::service::Service;

/// ultradoc: question answering and field extraction for logistics documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/udi.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "udi",
    about = "ultradoc: question answering and field extraction for logistics documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/udi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Add documents (PDF, DOCX, TXT) and rebuild the index.
    ///
    /// Files are copied into `[storage].upload_dir`; the index and the
    /// structured fields are rebuilt over everything in that directory.
    Ingest {
        /// Files to add.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a question about the uploaded documents.
    Ask {
        /// The question.
        question: String,
    },

    /// Extract structured shipment fields from the uploaded documents.
    Extract,

    /// Show the embedder settings and the state of the index snapshot.
    IndexInfo,
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
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { files } => {
            let service = Service::from_config(cfg)?;
            print_json(&service.ingest(&files).await?)?;
        }
        Commands::Ask { question } => {
            if question.trim().is_empty() {
                anyhow::bail!("question must not be empty");
            }
            let service = Service::from_config(cfg)?;
            print_json(&service.ask(&question).await?)?;
        }
        Commands::Extract => {
            let service = Service::from_config(cfg)?;
            print_json(&service.extract().await?)?;
        }
        Commands::IndexInfo => {
            let service = Service::from_config(cfg)?;
            print_json(&service.index_info().await?)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
