use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use netsentry_cli::cli::{Cli, Commands};
use netsentry_cli::commands;
use netsentry_cli::error::CliError;
use netsentry_cli::logging::init_tracing;
use netsentry_cli::metrics_server::install_metrics_recorder;
use netsentry_cli::output::OutputWriter;
use netsentry_core::config::{GeneralConfig, NetsentryConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let writer = OutputWriter::new(cli.output);
    let log_level = cli.log_level.as_deref();

    match cli.command {
        // `config` reports a broken file instead of failing during startup.
        Commands::Config(args) => {
            init_tracing(&GeneralConfig::default(), log_level)?;
            commands::config::execute(args, &cli.config, &writer).await?;
        }
        Commands::Ingest(args) => {
            let config = prepare(&cli.config, log_level).await?;
            commands::ingest::execute(args, &config, &writer).await?;
        }
        Commands::Publish(args) => {
            let config = prepare(&cli.config, log_level).await?;
            commands::publish::execute(args, &config, &writer).await?;
        }
    }

    Ok(())
}

/// Load configuration, then bring up logging and the metrics listener.
async fn prepare(path: &Path, log_level: Option<&str>) -> anyhow::Result<NetsentryConfig> {
    let config = NetsentryConfig::load(path).await.map_err(CliError::from)?;
    init_tracing(&config.general, log_level)?;
    install_metrics_recorder(&config.metrics)?;
    tracing::debug!(config = %path.display(), "configuration loaded");
    Ok(config)
}
