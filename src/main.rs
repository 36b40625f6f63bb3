//! # Speech EDA CLI (`eda`)
//!
//! The `eda` binary drives the pipeline: build tables from raw speech
//! records, embed paragraphs, and export similarity and feature-space
//! artifacts for the viewer.
//!
//! ## Usage
//!
//! ```bash
//! eda --config ./eda.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eda tables <input> <authors> <output>` | Build author, text and paragraph tables |
//! | `eda embed <dir> --kind <kind>` | Embed paragraphs and aggregate per speech |
//! | `eda export <dir> --output <dir>` | Write similarity and feature-space files |
//! | `eda stats <dir>` | Summarize a table directory |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`). Command summaries go to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use speech_eda::progress::ProgressMode;
use speech_eda::{config, embed_cmd, export, stats, tables_cmd};
use speech_eda_core::models::EmbeddingKind;

/// Speech EDA: exploratory analysis of presidential speeches.
///
/// All commands accept a `--config` flag pointing to an optional TOML
/// configuration file. When the file does not exist, defaults are used.
#[derive(Parser)]
#[command(
    name = "eda",
    about = "Speech EDA — tables, embeddings and similarity for presidential speeches",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./eda.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./eda.toml")]
    config: PathBuf,

    /// Embed progress on stderr: `off`, `human`, or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal, otherwise `off`.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the author, text and paragraph tables.
    ///
    /// Reads every raw record in `input`, resolves authors through the
    /// alias file, and writes `author.jsonl`, `text.jsonl` and
    /// `paragraph.jsonl` into `output`. Nothing is written if any record
    /// is malformed or names an unknown author.
    Tables {
        /// Directory of raw speech records (one JSON object per file).
        input: PathBuf,
        /// Alias file: `[{"Canonical Name": ["alias", ...]}, ...]`.
        authors: PathBuf,
        /// Directory the tables are written to (created if missing).
        output: PathBuf,
    },

    /// Embed every paragraph and aggregate per speech.
    ///
    /// Requires `paragraph.jsonl`. Writes `<kind>.paragraph.jsonl` and
    /// `<kind>.text.jsonl`. Neural kinds need `OPENAI_API_KEY`.
    Embed {
        /// Table directory.
        dir: PathBuf,
        /// Embedding kind: `tfidf`, `openai-ada-002`, or `openai-3-small`.
        #[arg(long)]
        kind: EmbeddingKind,
    },

    /// Write similarity and feature-space artifacts.
    ///
    /// Uses every `<kind>.text.jsonl` present in the table directory.
    Export {
        /// Table directory.
        dir: PathBuf,
        /// Directory the artifacts are written to (created if missing).
        #[arg(long)]
        output: PathBuf,
    },

    /// Print row counts, embedding coverage and table digests.
    Stats {
        /// Table directory.
        dir: PathBuf,
    },
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Tables {
            input,
            authors,
            output,
        } => {
            tables_cmd::run_tables(&cfg, &input, &authors, &output)?;
        }
        Commands::Embed { dir, kind } => {
            let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            embed_cmd::run_embed(&cfg, &dir, kind, reporter.as_ref()).await?;
        }
        Commands::Export { dir, output } => {
            export::run_export(&cfg, &dir, &output)?;
        }
        Commands::Stats { dir } => {
            stats::run_stats(&dir)?;
        }
    }

    Ok(())
}
