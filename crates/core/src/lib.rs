#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    AlertError, ConfigError, DetectionError, LookupError, NetsentryError, NormalizationError,
    QueueSendError, TransportError,
};

// 설정
pub use config::NetsentryConfig;

// 이벤트
pub use event::{DetectionResult, EnrichmentResult, Event};

// 파이프라인 trait
pub use pipeline::{
    AlertChannel, BoxFuture, Detector, DynAlertChannel, DynEnricher, DynQueueProducer, Enricher,
    QueueProducer, QueueResult,
};

// 메트릭
pub use metrics::{EventKind, MetricsSink, NoopMetrics, PrometheusMetrics};

// 도메인 타입
pub use types::{Alert, AnomalyRecord, Severity};
