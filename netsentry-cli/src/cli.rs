//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Netsentry -- network telemetry anomaly detection pipeline.
///
/// Use `netsentry <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "netsentry", version, about, long_about = None)]
pub struct Cli {
    /// Path to the netsentry.toml configuration file.
    #[arg(short, long, global = true, default_value = "netsentry.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a JSON array of raw events through the detection pipeline.
    Ingest(IngestArgs),

    /// Normalize a JSON array of raw events and publish it to the configured queue.
    Publish(PublishArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- ingest ----

/// Process raw events from a file and report anomalies.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON file containing an array of raw events.
    pub file: PathBuf,

    /// Collector id recorded on every event.
    #[arg(long, default_value = "cli")]
    pub collector: String,

    /// Number of most recent anomalies to show.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

// ---- publish ----

/// Send normalized event batches to the configured queue backend.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// JSON file containing an array of raw events.
    pub file: PathBuf,

    /// Collector id recorded on every event.
    #[arg(long, default_value = "cli")]
    pub collector: String,

    /// Raw records per batch.
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,
}

// ---- config ----

/// Manage netsentry configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section
        /// (general, pipeline, detector, enrichment, queue, alerts, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
