//! netsentry.toml 통합 설정 테스트
//!
//! - netsentry.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 / 잘못된 형식 에러 테스트

use std::io::Write;

use netsentry_core::config::NetsentryConfig;
use netsentry_core::error::{ConfigError, NetsentryError};

const EXAMPLE: &str = include_str!("../../../netsentry.toml.example");

/// 환경변수를 설정한 채로 `f`를 실행하고 원래 값으로 되돌립니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 호출하는 테스트는 serial_test로 직렬화되어 있습니다.
    unsafe { std::env::set_var(key, value) };

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// netsentry.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = NetsentryConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = NetsentryConfig::parse(EXAMPLE).expect("should parse");
    let from_code = NetsentryConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);

    assert_eq!(
        from_file.pipeline.anomaly_threshold,
        from_code.pipeline.anomaly_threshold
    );
    assert_eq!(
        from_file.pipeline.strict_addresses,
        from_code.pipeline.strict_addresses
    );

    assert_eq!(from_file.detector.kind, from_code.detector.kind);
    assert_eq!(
        from_file.detector.sensitive_ports,
        from_code.detector.sensitive_ports
    );
    assert_eq!(
        from_file.detector.n_estimators,
        from_code.detector.n_estimators
    );
    assert_eq!(
        from_file.detector.contamination,
        from_code.detector.contamination
    );
    assert_eq!(from_file.detector.max_samples, from_code.detector.max_samples);
    assert_eq!(from_file.detector.seed, from_code.detector.seed);

    assert_eq!(from_file.queue.backend, from_code.queue.backend);
    assert_eq!(from_file.queue.stream_name, from_code.queue.stream_name);
    assert_eq!(from_file.queue.kafka_topic, from_code.queue.kafka_topic);
    assert_eq!(from_file.queue.redis_url, from_code.queue.redis_url);
    assert_eq!(from_file.queue.max_retries, from_code.queue.max_retries);
    assert_eq!(
        from_file.queue.retry_backoff_ms,
        from_code.queue.retry_backoff_ms
    );

    assert_eq!(from_file.alerts.smtp_port, from_code.alerts.smtp_port);
    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
}

#[test]
fn example_config_leaves_optional_integrations_unset() {
    let config = NetsentryConfig::parse(EXAMPLE).expect("should parse");
    assert!(config.detector.baseline_path().is_none());
    assert!(config.enrichment.geoip_db_path().is_none());
    assert!(config.enrichment.asn_db_path().is_none());
    assert!(config.alerts.slack_webhook_url().is_none());
    assert!(config.alerts.smtp_host().is_none());
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_detector_only() {
    let toml = r#"
[detector]
kind = "composite"
sensitive_ports = [22, 2222]
"#;
    let config = NetsentryConfig::parse(toml).expect("should parse");
    assert_eq!(config.detector.kind, "composite");
    assert_eq!(config.detector.sensitive_ports, vec![22, 2222]);
    // 다른 필드는 기본값
    assert_eq!(config.detector.n_estimators, 100);
    assert_eq!(config.queue.backend, "memory");
    config.validate().expect("composite without baseline is valid");
}

#[test]
fn partial_config_alerts_only() {
    let toml = r#"
[alerts]
smtp_host = "mail.example.com"
smtp_from = "alerts@example.com"
"#;
    let config = NetsentryConfig::parse(toml).expect("should parse");
    assert_eq!(config.alerts.smtp_host(), Some("mail.example.com"));
    assert_eq!(config.alerts.smtp_from(), Some("alerts@example.com"));
    assert_eq!(config.alerts.effective_smtp_port(), 25);
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[queue]
max_retries = "three"
"#;
    let err = NetsentryConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        NetsentryError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[general]
log_level = "debug"

[dashboard]
theme = "dark"
"#;
    let config = NetsentryConfig::parse(toml).expect("unknown sections should be ignored");
    assert_eq!(config.general.log_level, "debug");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[queue]
backend = "memory"
"#;
    let backend = with_env("NETSENTRY_QUEUE_BACKEND", "kafka", || {
        let mut config = NetsentryConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.queue.backend
    });
    assert_eq!(backend, "kafka");
}

#[test]
#[serial_test::serial]
fn env_override_float_field() {
    let threshold = with_env("NETSENTRY_PIPELINE_ANOMALY_THRESHOLD", "0.75", || {
        let mut config = NetsentryConfig::default();
        config.apply_env_overrides();
        config.pipeline.anomaly_threshold
    });
    assert_eq!(threshold, 0.75);
}

#[test]
#[serial_test::serial]
fn env_override_port_list() {
    let ports = with_env("NETSENTRY_DETECTOR_SENSITIVE_PORTS", "22,3389", || {
        let mut config = NetsentryConfig::default();
        config.apply_env_overrides();
        config.detector.sensitive_ports
    });
    assert_eq!(ports, vec![22, 3389]);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let strict = with_env("NETSENTRY_PIPELINE_STRICT_ADDRESSES", "true", || {
        let mut config = NetsentryConfig::default();
        config.apply_env_overrides();
        config.pipeline.strict_addresses
    });
    assert!(strict);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_toml_value() {
    let toml = r#"
[queue]
max_retries = 5
"#;
    let retries = with_env("NETSENTRY_QUEUE_MAX_RETRIES", "many", || {
        let mut config = NetsentryConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.queue.max_retries
    });
    assert_eq!(retries, 5);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = NetsentryConfig::from_file("/tmp/netsentry_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        NetsentryError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_validates_file_contents() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[pipeline]\nanomaly_threshold = 2.0").expect("write");

    let err = NetsentryConfig::load(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("anomaly_threshold"));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(EXAMPLE.as_bytes()).expect("write");

    let config = NetsentryConfig::load(file.path())
        .await
        .expect("example should load");
    assert_eq!(config.queue.stream_name, "anomaly-events");
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn example_config_serialize_roundtrip() {
    let config = NetsentryConfig::parse(EXAMPLE).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = NetsentryConfig::parse(&serialized).expect("should reparse");
    reparsed.validate().expect("should validate");

    assert_eq!(config.detector.kind, reparsed.detector.kind);
    assert_eq!(config.metrics.listen_addr, reparsed.metrics.listen_addr);
}
