//! `netsentry config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use netsentry_core::config::NetsentryConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const REDACTED: &str = "***REDACTED***";

/// Sections accepted by `config show --section`.
pub const SECTIONS: [&str; 7] = [
    "general",
    "pipeline",
    "detector",
    "enrichment",
    "queue",
    "alerts",
    "metrics",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (parse errors, invalid values).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validation_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Validate the file at `config_path` without rendering.
pub async fn validation_report(config_path: &Path) -> ConfigValidationReport {
    let errors = match NetsentryConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = NetsentryConfig::load(config_path).await?;
    let report = show_report(config, &config_path.display().to_string(), section.as_deref())?;
    writer.render(&report)?;

    Ok(())
}

/// Build the redacted display report for a loaded configuration.
pub fn show_report(
    mut config: NetsentryConfig,
    source: &str,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    redact_credentials(&mut config);

    let config_toml = match section {
        None => to_toml(&config)?,
        Some("general") => to_toml(&config.general)?,
        Some("pipeline") => to_toml(&config.pipeline)?,
        Some("detector") => to_toml(&config.detector)?,
        Some("enrichment") => to_toml(&config.enrichment)?,
        Some("queue") => to_toml(&config.queue)?,
        Some("alerts") => to_toml(&config.alerts)?,
        Some("metrics") => to_toml(&config.metrics)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: source.to_owned(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> Result<String, CliError> {
    toml::to_string_pretty(value)
        .map_err(|e| CliError::Command(format!("failed to serialize configuration: {}", e)))
}

/// Redact secrets before display.
///
/// The Slack webhook path is itself the credential, so only scheme and host survive.
fn redact_credentials(config: &mut NetsentryConfig) {
    config.queue.redis_url = redact_url(&config.queue.redis_url);
    if !config.alerts.smtp_password.is_empty() {
        config.alerts.smtp_password = REDACTED.to_owned();
    }
    config.alerts.slack_webhook_url = redact_webhook(&config.alerts.slack_webhook_url);
}

/// Replace `user:password@` in a connection URL with a placeholder.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    let authority_end = rest.find('/').unwrap_or(rest.len());

    match rest[..authority_end].rfind('@') {
        Some(at_pos) => format!("{}{}{}", scheme, REDACTED, &rest[at_pos..]),
        None => url.to_owned(),
    }
}

fn redact_webhook(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    match rest.find('/') {
        Some(slash) => format!("{}{}/{}", scheme, &rest[..slash], REDACTED),
        None => url.to_owned(),
    }
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (with redacted credentials)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
