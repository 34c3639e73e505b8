//! Prometheus metrics HTTP listener.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! The listener lives as long as the process, so it only matters for
//! long-running commands such as `ingest` on a large file.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use netsentry_core::config::MetricsConfig;

/// Parse `listen_addr:port` into a socket address.
pub fn listen_address(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Does nothing when `metrics.enabled` is false.
///
/// # Errors
///
/// - The listen address does not parse
/// - Socket binding fails
/// - A global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        tracing::debug!("metrics disabled");
        return Ok(());
    }

    let addr = listen_address(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    netsentry_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_address_from_config() {
        let config = MetricsConfig::default();
        let addr = listen_address(&config).expect("default address parses");
        assert_eq!(addr.port(), 9100);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn invalid_listen_address_is_error() {
        let config = MetricsConfig {
            listen_addr: "not an address".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(listen_address(&config).is_err());
    }

    #[test]
    fn disabled_metrics_install_nothing() {
        let config = MetricsConfig {
            enabled: false,
            listen_addr: "not an address".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(install_metrics_recorder(&config).is_ok());
    }
}
