//! `netsentry publish` command handler
//!
//! Reads a JSON array file through [`JsonFileCollector`] and forwards each
//! normalized batch to the configured queue backend. Ctrl-C stops the run
//! after the batch in flight.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use netsentry_core::config::NetsentryConfig;
use netsentry_core::pipeline::DynQueueProducer;
use netsentry_pipeline::{
    CollectorConfig, CollectorStatus, JsonFileCollector, Normalizer, QueueClients, QueueSink,
    build_producer, run_collector,
};

use crate::cli::PublishArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `publish` command.
pub async fn execute(
    args: PublishArgs,
    config: &NetsentryConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let clients = QueueClients::from_config(&config.queue)?;
    let producer: Arc<dyn DynQueueProducer> = Arc::from(build_producer(&config.queue, clients)?);

    let cancel = CancellationToken::new();
    let signal_guard = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current batch");
            signal_guard.cancel();
        }
    });

    let result = publish_file(
        config,
        producer,
        &args.file,
        &args.collector,
        args.batch_size,
        &cancel,
    )
    .await;
    signal_task.abort();

    writer.render(&result?)?;
    Ok(())
}

/// Normalize `path` in batches and hand every batch to `producer`.
pub async fn publish_file(
    config: &NetsentryConfig,
    producer: Arc<dyn DynQueueProducer>,
    path: &Path,
    collector: &str,
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<PublishReport, CliError> {
    let collector_config = CollectorConfig::new(collector).with_batch_size(batch_size);
    let normalizer = Normalizer::default().with_strict_addresses(config.pipeline.strict_addresses);
    let mut source = JsonFileCollector::open(path, &collector_config, normalizer).await?;

    let backend = producer.backend().to_owned();
    let sink = QueueSink::new(producer);
    let report = run_collector(&collector_config, &mut source, &sink, cancel).await?;

    info!(
        backend = %backend,
        events = report.events,
        rejected = source.rejected(),
        "publish finished"
    );

    Ok(PublishReport {
        source: path.display().to_string(),
        backend,
        status: status_name(report.status).to_owned(),
        batches: report.batches,
        events: report.events,
        rejected: source.rejected(),
        remaining: source.remaining(),
    })
}

fn status_name(status: CollectorStatus) -> &'static str {
    match status {
        CollectorStatus::Disabled => "disabled",
        CollectorStatus::Exhausted => "completed",
        CollectorStatus::Cancelled => "cancelled",
    }
}

/// Summary of one `publish` run.
#[derive(Serialize)]
pub struct PublishReport {
    /// Input file path
    pub source: String,
    /// Queue backend name
    pub backend: String,
    /// completed, cancelled or disabled
    pub status: String,
    /// Batches delivered
    pub batches: usize,
    /// Events delivered
    pub events: usize,
    /// Records rejected by normalization
    pub rejected: usize,
    /// Records left unread after cancellation
    pub remaining: usize,
}

impl Render for PublishReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Publish: {} -> {}", self.source.bold(), self.backend.bold())?;
        let status = match self.status.as_str() {
            "completed" => self.status.green(),
            _ => self.status.yellow(),
        };
        writeln!(w, "  Status: {}", status)?;
        writeln!(w, "  Batches: {}", self.batches)?;
        writeln!(w, "  Events: {}", self.events)?;
        writeln!(w, "  Rejected: {}", self.rejected)?;
        if self.remaining > 0 {
            writeln!(w, "  Unsent: {}", self.remaining)?;
        }
        Ok(())
    }
}
