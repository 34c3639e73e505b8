//! 메트릭 상수, 설명 등록, 메트릭 수집기 contract
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인은 [`MetricsSink`]를 통해서만 처리/이상/점수 신호를 내보내고,
//! 큐와 알림 모듈은 상수를 사용하여 `metrics::counter!()` 매크로를 직접 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `netsentry_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use netsentry_core::metrics::{QUEUE_EVENTS_SENT_TOTAL, LABEL_BACKEND};
//!
//! metrics::counter!(QUEUE_EVENTS_SENT_TOTAL, LABEL_BACKEND => "redis").increment(10);
//! ```

use std::fmt;

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 유형 레이블 키 (processed, anomaly)
pub const LABEL_TYPE: &str = "type";

/// 탐지기 이름 레이블 키
pub const LABEL_DETECTOR: &str = "detector";

/// 큐 백엔드 레이블 키 (memory, redis, kafka)
pub const LABEL_BACKEND: &str = "backend";

/// 알림 채널 레이블 키 (email, slack)
pub const LABEL_CHANNEL: &str = "channel";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 파이프라인 메트릭 ─────────────────────────────────────────────

/// 처리/이상 이벤트 수 (counter, label: type)
pub const EVENTS_TOTAL: &str = "netsentry_events_total";

/// 탐지기별 마지막 점수 (gauge, label: detector)
pub const DETECTOR_LAST_SCORE: &str = "netsentry_detector_last_score";

/// 정규화에서 거부된 원시 이벤트 수 (counter)
pub const EVENTS_REJECTED_TOTAL: &str = "netsentry_events_rejected_total";

// ─── 큐 메트릭 ─────────────────────────────────────────────────────

/// 전송 완료된 이벤트 수 (counter, label: backend)
pub const QUEUE_EVENTS_SENT_TOTAL: &str = "netsentry_queue_events_sent_total";

/// 재시도 횟수 (counter, label: backend)
pub const QUEUE_RETRIES_TOTAL: &str = "netsentry_queue_retries_total";

/// 재시도 소진으로 실패한 배치 수 (counter, label: backend)
pub const QUEUE_SEND_FAILURES_TOTAL: &str = "netsentry_queue_send_failures_total";

// ─── 알림 메트릭 ───────────────────────────────────────────────────

/// 채널별 알림 전송 결과 (counter, labels: channel, result)
pub const ALERTS_DISPATCHED_TOTAL: &str = "netsentry_alerts_dispatched_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        EVENTS_TOTAL,
        "Events seen by the pipeline, by type (processed, anomaly)"
    );
    describe_gauge!(
        DETECTOR_LAST_SCORE,
        "Most recent anomaly score produced by each detector"
    );
    describe_counter!(
        EVENTS_REJECTED_TOTAL,
        "Raw events rejected during normalization"
    );
    describe_counter!(
        QUEUE_EVENTS_SENT_TOTAL,
        "Events delivered to the downstream queue"
    );
    describe_counter!(QUEUE_RETRIES_TOTAL, "Queue batch send retries");
    describe_counter!(
        QUEUE_SEND_FAILURES_TOTAL,
        "Queue batches that exhausted their retry attempts"
    );
    describe_counter!(
        ALERTS_DISPATCHED_TOTAL,
        "Alert deliveries per channel and result"
    );
}

// ─── MetricsSink ────────────────────────────────────────────────────

/// 파이프라인이 내보내는 이벤트 카운트 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 정규화를 통과한 이벤트
    Processed,
    /// 임계값을 넘은 이벤트
    Anomaly,
}

impl EventKind {
    /// 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Anomaly => "anomaly",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파이프라인의 메트릭 수집기 contract
pub trait MetricsSink: Send + Sync {
    /// 이벤트 수를 기록합니다.
    fn record_event(&self, kind: EventKind);

    /// 탐지기의 점수를 기록합니다.
    fn record_score(&self, detector: &str, score: f64);
}

/// `metrics` 파사드로 기록하는 수집기
///
/// 레코더가 설치되지 않았으면 기록은 무시됩니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn record_event(&self, kind: EventKind) {
        metrics::counter!(EVENTS_TOTAL, LABEL_TYPE => kind.as_str()).increment(1);
    }

    fn record_score(&self, detector: &str, score: f64) {
        metrics::gauge!(DETECTOR_LAST_SCORE, LABEL_DETECTOR => detector.to_owned()).set(score);
    }
}

/// 아무것도 기록하지 않는 수집기
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_event(&self, _kind: EventKind) {}

    fn record_score(&self, _detector: &str, _score: f64) {}
}
