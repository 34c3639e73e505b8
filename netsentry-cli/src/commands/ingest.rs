//! `netsentry ingest` command handler
//!
//! Assembles a [`PipelineProcessor`] from configuration, runs every record of a
//! JSON array file through it and reports the anomalies that were stored.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use netsentry_core::config::NetsentryConfig;
use netsentry_core::event::Event;
use netsentry_core::metrics::PrometheusMetrics;
use netsentry_core::types::AnomalyRecord;
use netsentry_pipeline::alert::channels_from_config;
use netsentry_pipeline::collector::read_json_array;
use netsentry_pipeline::{
    AlertDispatcher, Normalizer, PipelineProcessor, build_detector, enricher_from_config,
};

use crate::cli::IngestArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `ingest` command.
pub async fn execute(
    args: IngestArgs,
    config: &NetsentryConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let processor = assemble_processor(config).await?;
    let report = ingest_file(&processor, &args.file, &args.collector, args.limit).await?;
    writer.render(&report)?;
    Ok(())
}

/// Build the processor described by `config`.
///
/// The detector is fitted on `detector.baseline_path` when one is set.
pub async fn assemble_processor(config: &NetsentryConfig) -> Result<PipelineProcessor, CliError> {
    let normalizer = Normalizer::default().with_strict_addresses(config.pipeline.strict_addresses);

    let baseline = match config.detector.baseline_path() {
        Some(path) => load_baseline(path, &normalizer).await?,
        None => Vec::new(),
    };
    let detector = build_detector(&config.detector, &baseline)
        .map_err(netsentry_pipeline::PipelineError::from)?;
    let enricher = enricher_from_config(&config.enrichment).await?;
    let dispatcher = AlertDispatcher::new(channels_from_config(&config.alerts)?);

    let processor = PipelineProcessor::builder()
        .normalizer(normalizer)
        .config(&config.pipeline)
        .maybe_detector(detector)
        .enricher(enricher)
        .dispatcher(dispatcher)
        .metrics(Arc::new(PrometheusMetrics))
        .build()?;
    Ok(processor)
}

/// Normalize the baseline file, skipping records that do not normalize.
async fn load_baseline(path: &str, normalizer: &Normalizer) -> Result<Vec<Event>, CliError> {
    let records = read_json_array(path).await?;
    let total = records.len();
    let events: Vec<Event> = records
        .iter()
        .filter_map(|raw| normalizer.normalize_value(raw, Some("baseline")).ok())
        .collect();

    if events.len() < total {
        warn!(
            path,
            skipped = total - events.len(),
            "baseline records rejected during normalization"
        );
    }
    info!(path, events = events.len(), "baseline loaded");
    Ok(events)
}

/// Process every record in `path` and summarize the run.
pub async fn ingest_file(
    processor: &PipelineProcessor,
    path: &Path,
    collector: &str,
    limit: usize,
) -> Result<IngestReport, CliError> {
    let records = read_json_array(path).await?;
    info!(path = %path.display(), records = records.len(), "ingesting");

    let mut processed = 0;
    let mut rejected = 0;
    let mut anomalies = 0;
    for raw in &records {
        match processor.process_value(raw, Some(collector)).await {
            Ok(result) => {
                processed += 1;
                if result.score >= processor.anomaly_threshold() {
                    anomalies += 1;
                }
            }
            Err(_) => rejected += 1,
        }
    }

    let recent = processor.repository().list_recent(limit).await;
    info!(processed, rejected, anomalies, "ingest finished");

    Ok(IngestReport {
        source: path.display().to_string(),
        detector: processor.detector_name().to_owned(),
        threshold: processor.anomaly_threshold(),
        processed,
        rejected,
        anomalies,
        recent,
    })
}

/// Summary of one `ingest` run.
#[derive(Serialize)]
pub struct IngestReport {
    /// Input file path
    pub source: String,
    /// Active detector name
    pub detector: String,
    /// Alert threshold in effect
    pub threshold: f64,
    /// Records that normalized successfully
    pub processed: usize,
    /// Records rejected by normalization
    pub rejected: usize,
    /// Events at or above the threshold
    pub anomalies: usize,
    /// Most recent stored anomalies, newest first
    pub recent: Vec<AnomalyRecord>,
}

impl Render for IngestReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Ingest: {}", self.source.bold())?;
        writeln!(
            w,
            "  Detector: {} (threshold {:.2})",
            self.detector, self.threshold
        )?;
        writeln!(w, "  Processed: {}", self.processed)?;
        if self.rejected > 0 {
            writeln!(w, "  Rejected: {}", self.rejected.to_string().yellow())?;
        } else {
            writeln!(w, "  Rejected: 0")?;
        }

        if self.anomalies == 0 {
            writeln!(w, "  Anomalies: {}", "none".green())?;
            return Ok(());
        }
        writeln!(w, "  Anomalies: {}", self.anomalies.to_string().red().bold())?;

        writeln!(w)?;
        writeln!(w, "{:<6} {:<7} {:<22} Description", "ID", "Score", "Event")?;
        writeln!(w, "{}", "-".repeat(72))?;
        for record in &self.recent {
            let target = match (record.event.destination_ip, record.event.destination_port) {
                (Some(ip), Some(port)) => format!("{ip}:{port}"),
                (Some(ip), None) => ip.to_string(),
                (None, Some(port)) => format!("*:{port}"),
                (None, None) => "-".to_owned(),
            };
            writeln!(
                w,
                "{:<6} {:<7.2} {:<22} {}",
                record.id, record.score, target, record.description
            )?;
        }
        Ok(())
    }
}
