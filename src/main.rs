//! # corpus-sync CLI (`csync`)
//!
//! The `csync` binary drives incremental synchronization of a document
//! corpus into a vector-capable chunk index.
//!
//! ## Usage
//!
//! ```bash
//! csync --config ./config/csync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csync init` | Create the run-report database and its schema |
//! | `csync sources` | Show the configured source and index stores |
//! | `csync plan` | Compute the reconciliation plan without mutating anything |
//! | `csync sync` | Run a full incremental sync |

mod augment;
mod chunker;
mod chunker_character;
mod chunker_markdown;
mod chunker_recursive;
mod completion;
mod config;
mod diff;
mod embedding;
mod error;
mod http;
mod index_http;
#[allow(dead_code)]
mod index_memory;
mod keywords;
mod models;
mod ocr;
mod parser;
mod parser_docx;
mod parser_pdf;
mod parser_sheet;
mod parser_text;
mod pipeline;
mod processor;
mod progress;
mod report;
mod source_drive;
mod source_fs;
mod sync_cmd;
mod traits;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use progress::ProgressMode;

/// corpus-sync CLI — keep a chunk index in step with a document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/csync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "csync",
    about = "Incremental sync of a document corpus into a vector-capable chunk index",
    version,
    long_about = "corpus-sync lists a source file store and a destination chunk index, diffs \
    the two by change token, and processes only what changed: new and updated files are parsed, \
    chunked, embedded, and upserted; vanished files have their chunks deleted."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the run-report database schema.
    ///
    /// Creates the SQLite report database and its tables. Idempotent.
    Init,

    /// Show the configured stores and whether they look reachable.
    Sources,

    /// Compute and print the reconciliation plan without processing,
    /// upserting, or deleting anything.
    Plan,

    /// Run a full incremental sync.
    Sync {
        /// Compute the plan and show counts without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },
}

fn progress_mode(value: &str) -> anyhow::Result<ProgressMode> {
    match value {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        "off" => Ok(ProgressMode::Off),
        other => anyhow::bail!("Unknown progress mode: {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            match &cfg.report.path {
                Some(path) => {
                    report::SqliteReportSink::open(path).await?;
                    println!("Report database initialized at {}.", path.display());
                }
                None => println!("No report.path configured; nothing to initialize."),
            }
        }
        Commands::Sources => {
            sync_cmd::list_sources(&cfg)?;
        }
        Commands::Plan => {
            sync_cmd::run_plan(&cfg).await?;
        }
        Commands::Sync { dry_run, progress } => {
            let mode = progress_mode(&progress)?;
            sync_cmd::run_sync(&cfg, dry_run, mode).await?;
        }
    }

    Ok(())
}
