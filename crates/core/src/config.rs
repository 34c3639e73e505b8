//! 설정 관리 -- netsentry.toml 파싱 및 런타임 설정
//!
//! [`NetsentryConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//! 전역 조회는 없습니다. 조립 시점에 각 섹션을 생성자에 넘깁니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`NETSENTRY_QUEUE_BACKEND=redis` 형식)
//! 3. 설정 파일 (`netsentry.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), netsentry_core::error::NetsentryError> {
//! use netsentry_core::config::NetsentryConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = NetsentryConfig::load("netsentry.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = NetsentryConfig::parse("[pipeline]\nanomaly_threshold = 0.7")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, NetsentryError};

/// 지원하는 탐지기 종류
pub const DETECTOR_KINDS: [&str; 4] = ["heuristic", "isolation-forest", "composite", "none"];

/// 지원하는 큐 백엔드
pub const QUEUE_BACKENDS: [&str; 3] = ["memory", "redis", "kafka"];

/// Netsentry 통합 설정
///
/// `netsentry.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetsentryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 처리기 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// 탐지기 설정
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 인리치먼트 설정
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// 큐 프로듀서 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 알림 채널 설정
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// 메트릭 익스포터 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NetsentryConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, NetsentryError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NetsentryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NetsentryError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                NetsentryError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, NetsentryError> {
        toml::from_str(toml_str).map_err(|e| {
            NetsentryError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `NETSENTRY_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "NETSENTRY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "NETSENTRY_GENERAL_LOG_FORMAT");

        // Pipeline
        override_f64(
            &mut self.pipeline.anomaly_threshold,
            "NETSENTRY_PIPELINE_ANOMALY_THRESHOLD",
        );
        override_bool(
            &mut self.pipeline.strict_addresses,
            "NETSENTRY_PIPELINE_STRICT_ADDRESSES",
        );

        // Detector
        override_string(&mut self.detector.kind, "NETSENTRY_DETECTOR_KIND");
        override_port_csv(
            &mut self.detector.sensitive_ports,
            "NETSENTRY_DETECTOR_SENSITIVE_PORTS",
        );
        override_usize(
            &mut self.detector.n_estimators,
            "NETSENTRY_DETECTOR_N_ESTIMATORS",
        );
        override_f64(
            &mut self.detector.contamination,
            "NETSENTRY_DETECTOR_CONTAMINATION",
        );
        override_usize(&mut self.detector.max_samples, "NETSENTRY_DETECTOR_MAX_SAMPLES");
        override_u64(&mut self.detector.seed, "NETSENTRY_DETECTOR_SEED");
        override_string(
            &mut self.detector.baseline_path,
            "NETSENTRY_DETECTOR_BASELINE_PATH",
        );

        // Enrichment
        override_string(
            &mut self.enrichment.geoip_db_path,
            "NETSENTRY_ENRICHMENT_GEOIP_DB_PATH",
        );
        override_string(
            &mut self.enrichment.asn_db_path,
            "NETSENTRY_ENRICHMENT_ASN_DB_PATH",
        );

        // Queue
        override_string(&mut self.queue.backend, "NETSENTRY_QUEUE_BACKEND");
        override_string(&mut self.queue.stream_name, "NETSENTRY_QUEUE_STREAM_NAME");
        override_string(&mut self.queue.kafka_topic, "NETSENTRY_QUEUE_KAFKA_TOPIC");
        override_string(&mut self.queue.redis_url, "NETSENTRY_QUEUE_REDIS_URL");
        override_string(
            &mut self.queue.kafka_bootstrap,
            "NETSENTRY_QUEUE_KAFKA_BOOTSTRAP",
        );
        override_u32(&mut self.queue.max_retries, "NETSENTRY_QUEUE_MAX_RETRIES");
        override_u64(
            &mut self.queue.retry_backoff_ms,
            "NETSENTRY_QUEUE_RETRY_BACKOFF_MS",
        );

        // Alerts
        override_string(
            &mut self.alerts.slack_webhook_url,
            "NETSENTRY_ALERTS_SLACK_WEBHOOK_URL",
        );
        override_string(&mut self.alerts.smtp_host, "NETSENTRY_ALERTS_SMTP_HOST");
        override_u16(&mut self.alerts.smtp_port, "NETSENTRY_ALERTS_SMTP_PORT");
        override_string(
            &mut self.alerts.smtp_username,
            "NETSENTRY_ALERTS_SMTP_USERNAME",
        );
        override_string(
            &mut self.alerts.smtp_password,
            "NETSENTRY_ALERTS_SMTP_PASSWORD",
        );
        override_string(&mut self.alerts.smtp_from, "NETSENTRY_ALERTS_SMTP_FROM");

        // Metrics
        override_bool(&mut self.metrics.enabled, "NETSENTRY_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "NETSENTRY_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "NETSENTRY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetsentryError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let threshold = self.pipeline.anomaly_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "pipeline.anomaly_threshold",
                format!("must be within [0, 1], got {threshold}"),
            ));
        }

        self.detector.validate()?;

        // 큐 검증
        if !QUEUE_BACKENDS.contains(&self.queue.backend.as_str()) {
            return Err(invalid(
                "queue.backend",
                format!("must be one of: {}", QUEUE_BACKENDS.join(", ")),
            ));
        }
        if self.queue.max_retries == 0 {
            return Err(invalid("queue.max_retries", "must be at least 1".to_owned()));
        }
        if self.queue.backend == "redis" && self.queue.redis_url.is_empty() {
            return Err(invalid(
                "queue.redis_url",
                "must not be empty when backend is redis".to_owned(),
            ));
        }
        if self.queue.backend == "kafka" && self.queue.kafka_bootstrap.is_empty() {
            return Err(invalid(
                "queue.kafka_bootstrap",
                "must not be empty when backend is kafka".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must not be 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> NetsentryError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 빈 문자열은 미설정으로 취급합니다.
fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 처리기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 이 점수 이상이면 저장하고 알림을 보냅니다
    pub anomaly_threshold: f64,
    /// 출발지/목적지 주소가 모두 없으면 거부
    pub strict_addresses: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 0.5,
            strict_addresses: false,
        }
    }
}

/// 탐지기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 탐지기 종류 (heuristic, isolation-forest, composite, none)
    pub kind: String,
    /// 휴리스틱 탐지기의 민감 포트
    pub sensitive_ports: Vec<u16>,
    /// 격리 트리 수
    pub n_estimators: usize,
    /// 예상 이상 비율 (0, 0.5]
    pub contamination: f64,
    /// 트리당 최대 샘플 수
    pub max_samples: usize,
    /// 난수 시드
    pub seed: u64,
    /// 학습용 기준 이벤트 파일 (JSON 배열)
    pub baseline_path: String,
}

impl DetectorConfig {
    /// 기준 이벤트 파일 경로 (설정된 경우)
    pub fn baseline_path(&self) -> Option<&str> {
        non_empty(&self.baseline_path)
    }

    fn validate(&self) -> Result<(), NetsentryError> {
        if !DETECTOR_KINDS.contains(&self.kind.as_str()) {
            return Err(invalid(
                "detector.kind",
                format!("must be one of: {}", DETECTOR_KINDS.join(", ")),
            ));
        }
        if self.n_estimators == 0 {
            return Err(invalid(
                "detector.n_estimators",
                "must be at least 1".to_owned(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid(
                "detector.contamination",
                format!("must be within (0, 0.5], got {}", self.contamination),
            ));
        }
        if self.max_samples == 0 {
            return Err(invalid(
                "detector.max_samples",
                "must be at least 1".to_owned(),
            ));
        }
        if self.kind == "isolation-forest" && self.baseline_path().is_none() {
            return Err(invalid(
                "detector.baseline_path",
                "required when kind is isolation-forest".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: "heuristic".to_owned(),
            sensitive_ports: vec![22, 23, 3389, 5900],
            n_estimators: 100,
            contamination: 0.1,
            max_samples: 256,
            seed: 42,
            baseline_path: String::new(),
        }
    }
}

/// 인리치먼트 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// GeoIP 데이터베이스 경로
    pub geoip_db_path: String,
    /// ASN 데이터베이스 경로
    pub asn_db_path: String,
}

impl EnrichmentConfig {
    /// GeoIP 데이터베이스 경로 (설정된 경우)
    pub fn geoip_db_path(&self) -> Option<&str> {
        non_empty(&self.geoip_db_path)
    }

    /// ASN 데이터베이스 경로 (설정된 경우)
    pub fn asn_db_path(&self) -> Option<&str> {
        non_empty(&self.asn_db_path)
    }
}

/// 큐 프로듀서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 백엔드 (memory, redis, kafka)
    pub backend: String,
    /// Redis 스트림 이름
    pub stream_name: String,
    /// Kafka 토픽
    pub kafka_topic: String,
    /// Redis 연결 문자열
    pub redis_url: String,
    /// Kafka 부트스트랩 서버
    pub kafka_bootstrap: String,
    /// 배치당 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 대기 기본 단위 (밀리초, 시도 번호만큼 곱함)
    pub retry_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_owned(),
            stream_name: "anomaly-events".to_owned(),
            kafka_topic: "anomaly-events".to_owned(),
            redis_url: "redis://localhost:6379".to_owned(),
            kafka_bootstrap: "localhost:9092".to_owned(),
            max_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// 알림 채널 설정
///
/// 빈 값은 미설정입니다. 필요한 값이 없는 채널은 아무것도 하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Slack incoming webhook URL
    pub slack_webhook_url: String,
    /// SMTP 호스트
    pub smtp_host: String,
    /// SMTP 포트 (0이면 인증 시 587, 아니면 25)
    pub smtp_port: u16,
    /// SMTP 사용자명
    pub smtp_username: String,
    /// SMTP 비밀번호
    pub smtp_password: String,
    /// 발신 주소 (수신 주소로도 사용)
    pub smtp_from: String,
}

impl AlertsConfig {
    /// Slack webhook URL (설정된 경우)
    pub fn slack_webhook_url(&self) -> Option<&str> {
        non_empty(&self.slack_webhook_url)
    }

    /// SMTP 호스트 (설정된 경우)
    pub fn smtp_host(&self) -> Option<&str> {
        non_empty(&self.smtp_host)
    }

    /// 발신 주소 (설정된 경우)
    pub fn smtp_from(&self) -> Option<&str> {
        non_empty(&self.smtp_from)
    }

    /// 사용자명과 비밀번호가 모두 있을 때만 반환합니다.
    pub fn smtp_credentials(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.smtp_username)?,
            non_empty(&self.smtp_password)?,
        ))
    }

    /// 실제 접속 포트
    pub fn effective_smtp_port(&self) -> u16 {
        match (self.smtp_port, self.smtp_credentials()) {
            (0, Some(_)) => 587,
            (0, None) => 25,
            (port, _) => port,
        }
    }
}

/// 메트릭 익스포터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 익스포터 활성화
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f64(target: &mut f64, env_key: &str) {
    override_parsed(target, env_key, "f64");
}

fn override_port_csv(target: &mut Vec<u16>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<u16>, _> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<u16>)
            .collect();
        match parsed {
            Ok(ports) => *target = ports,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse port list from env var, ignoring"
            ),
        }
    }
}
