//! # Text Reader CLI (`reader`)
//!
//! The `reader` binary initializes the database, ingests documents from the
//! command line, and starts the HTTP server used by the reading frontend.
//!
//! ## Usage
//!
//! ```bash
//! reader --config ./config/reader.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `reader init` | Create the SQLite database and schema |
//! | `reader serve` | Start the HTTP server |
//! | `reader list` | List stored documents |
//! | `reader ingest <paths>...` | Parse, segment, and store local PDF/DOCX files |
//! | `reader segment <path>` | Print the paragraphs of a text file, without touching the database |
//!
//! Log verbosity follows `RUST_LOG` (default `text_reader=info,tower_http=info`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use text_reader::app::App;
use text_reader::ingest::Upload;
use text_reader::{config, migrate, segment, server};

/// Text Reader: document ingestion, paragraph notes, and LLM feedback.
///
/// All commands except `segment` read a TOML configuration file.
/// See `config/reader.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "reader",
    about = "Text Reader backend: upload documents, annotate paragraphs, get feedback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/reader.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the files, paragraphs and notes
    /// tables. Safe to run more than once.
    Init,

    /// Start the HTTP server.
    Serve,

    /// List stored documents with their paragraph counts.
    List,

    /// Ingest local files through the configured parser.
    ///
    /// Each file is processed independently; failures are reported and do
    /// not undo documents already stored.
    Ingest {
        /// PDF or DOCX files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the paragraphs a text file would be split into.
    Segment {
        /// Markdown or plain-text file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("text_reader=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    let command = match cli.command {
        Commands::Segment { path } => return print_segments(&path),
        other => other,
    };

    let cfg = config::load_config(&cli.config)?;

    match command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List => {
            let app = App::from_config(&cfg).await?;
            let documents = app.documents.list().await?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for doc in &documents {
                println!(
                    "{:>5}  {:<40}  {:>4} paragraphs",
                    doc.id,
                    doc.filename,
                    doc.paragraphs.len()
                );
            }
            app.close().await;
        }
        Commands::Ingest { paths } => {
            let app = App::from_config(&cfg).await?;
            let mut uploads = Vec::with_capacity(paths.len());
            for path in &paths {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                uploads.push(Upload {
                    filename,
                    bytes: std::fs::read(path)?,
                });
            }

            let result = app.ingestor.ingest_batch(uploads).await;
            app.close().await;
            let report = result?;

            for doc in &report.documents {
                println!(
                    "stored  {} ({} paragraphs)",
                    doc.filename,
                    doc.paragraphs.len()
                );
            }
            for name in &report.skipped {
                println!("skipped {} (no content)", name);
            }
            for failure in &report.failures {
                println!("failed  {}: {}", failure.filename, failure.message);
            }
        }
        Commands::Segment { path } => print_segments(&path)?,
    }

    Ok(())
}

fn print_segments(path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    for (i, paragraph) in segment::segment(&text).iter().enumerate() {
        println!("[{}] {}", i + 1, paragraph);
    }
    Ok(())
}
