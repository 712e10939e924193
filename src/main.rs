//! # Resource Ingest CLI (`ingest`)
//!
//! Runs the document-ingestion pipeline against a SQLite knowledge/status
//! database and a local bucket directory.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest init` | Create the SQLite database and run schema migrations |
//! | `ingest register <path>` | Create a `pending` status record for an upload path |
//! | `ingest handle --bucket <b> --path <p>` | Run the pipeline for one upload event |
//! | `ingest replay [FILE]` | Process JSON Lines upload events from a file or stdin |
//! | `ingest status <path>` | Show the status record(s) for an upload path |
//! | `ingest knowledge` | Show knowledge store contents |
//!
//! ## Examples
//!
//! ```bash
//! ingest init --config ./config/ingest.toml
//! ingest register resources/algebra.pdf --title "Algebra I"
//! ingest handle --bucket school-materials --path resources/algebra.pdf
//! ingest status resources/algebra.pdf
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use resource_ingest::config;
use resource_ingest::ingest;
use resource_ingest::logging;
use resource_ingest::migrate;
use resource_ingest::models::UploadEvent;

/// Resource Ingest CLI — extract, chunk, and index uploaded documents for RAG.
#[derive(Parser)]
#[command(
    name = "ingest",
    about = "Resource Ingest — extract, chunk, and index uploaded documents for RAG",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Register an upload path with a `pending` status record.
    ///
    /// Stands in for the upload flow that normally creates records; the
    /// pipeline itself never creates them.
    Register {
        /// Object path inside the bucket (e.g. `resources/algebra.pdf`).
        storage_path: String,

        /// Optional display title stored on the record.
        #[arg(long)]
        title: Option<String>,
    },

    /// Run the pipeline for a single upload event.
    Handle {
        /// Bucket the object was uploaded to.
        #[arg(long)]
        bucket: String,

        /// Object path inside the bucket.
        #[arg(long)]
        path: String,

        /// Declared content type of the upload.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Process upload events from a JSON Lines file (or stdin), in order.
    Replay {
        /// Events file. Reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Show the status record(s) for an upload path.
    Status {
        storage_path: String,
    },

    /// Show knowledge store contents.
    Knowledge {
        /// List the entries belonging to this document record id.
        #[arg(long)]
        record: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Register {
            storage_path,
            title,
        } => {
            let id = ingest::register_resource(&cfg, &storage_path, title).await?;
            println!("{}", id);
        }
        Commands::Handle {
            bucket,
            path,
            content_type,
        } => {
            let mut event = UploadEvent::new(bucket, path);
            event.content_type = content_type;
            ingest::run_handle(Arc::new(cfg), event).await?;
        }
        Commands::Replay { file } => {
            let summary = ingest::run_replay(Arc::new(cfg), file.as_deref()).await?;
            println!("replay");
            println!("  ingested: {}", summary.ingested);
            println!("  failed: {}", summary.failed);
            println!("  skipped: {}", summary.skipped);
            println!("  chunks written: {}", summary.chunks_written);
            println!("ok");
        }
        Commands::Status { storage_path } => {
            ingest::show_status(&cfg, &storage_path).await?;
        }
        Commands::Knowledge { record } => {
            ingest::show_knowledge(&cfg, record.as_deref()).await?;
        }
    }

    Ok(())
}
