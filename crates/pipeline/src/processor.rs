//! 파이프라인 프로세서 -- 정규화, 인리치먼트, 탐지, 임계값 정책 오케스트레이션
//!
//! [`PipelineProcessor::process`]는 원시 이벤트 하나를 다음 순서로 처리합니다.
//! 각 단계는 앞 단계가 끝난 뒤에만 시작합니다.
//!
//! 1. 정규화 (실패하면 [`NormalizationError`]를 그대로 반환)
//! 2. `processed` 카운트 기록
//! 3. 인리치먼트 (메타데이터가 있으면 payload의 `enrichment` 키에 병합)
//! 4. 탐지 (탐지기가 없으면 점수 0)
//! 5. 점수 기록
//! 6. 임계값 이상이면 `anomaly` 태그, 카운트, 저장소 기록, 알림 전송
//!
//! # 사용 예시
//! ```
//! use std::sync::Arc;
//! use netsentry_pipeline::detection::PortScanHeuristicDetector;
//! use netsentry_pipeline::processor::PipelineProcessor;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let processor = PipelineProcessor::builder()
//!     .detector(Box::new(PortScanHeuristicDetector::default()))
//!     .build()
//!     .unwrap();
//!
//! let raw = serde_json::json!({
//!     "timestamp": "2024-01-01T00:00:00Z",
//!     "dst_ip": "10.0.0.1",
//!     "dst_port": 22,
//!     "protocol": "tcp",
//! });
//! let result = processor.process_value(&raw, None).await.unwrap();
//! assert!(result.is_anomaly());
//! assert_eq!(processor.repository().len().await, 1);
//! # }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use netsentry_core::config::PipelineConfig;
use netsentry_core::error::NormalizationError;
use netsentry_core::event::{DetectionResult, ENRICHMENT_KEY, EnrichmentResult, Event, TAG_ANOMALY};
use netsentry_core::metrics::{EVENTS_REJECTED_TOTAL, EventKind, MetricsSink, NoopMetrics};
use netsentry_core::pipeline::{Detector, DynEnricher};
use netsentry_core::types::Alert;

use crate::alert::AlertDispatcher;
use crate::enrichment::NoOpEnricher;
use crate::error::PipelineError;
use crate::normalize::Normalizer;
use crate::repository::AnomalyRepository;

/// 기본 알림 임계값
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.5;

/// 탐지기가 없을 때의 탐지기 이름
const NO_DETECTOR: &str = "none";

/// 파이프라인 프로세서
///
/// [`PipelineProcessorBuilder`]로 생성합니다.
pub struct PipelineProcessor {
    normalizer: Normalizer,
    detector: Option<Box<dyn Detector>>,
    enricher: Box<dyn DynEnricher>,
    repository: Arc<AnomalyRepository>,
    dispatcher: Option<AlertDispatcher>,
    metrics: Arc<dyn MetricsSink>,
    anomaly_threshold: f64,
}

impl PipelineProcessor {
    /// 빌더를 생성합니다.
    pub fn builder() -> PipelineProcessorBuilder {
        PipelineProcessorBuilder::new()
    }

    /// 이상 이벤트 저장소
    pub fn repository(&self) -> &Arc<AnomalyRepository> {
        &self.repository
    }

    /// 알림 임계값
    pub fn anomaly_threshold(&self) -> f64 {
        self.anomaly_threshold
    }

    /// 설정된 탐지기 이름 (없으면 `none`)
    pub fn detector_name(&self) -> &str {
        self.detector.as_deref().map_or(NO_DETECTOR, |d| d.name())
    }

    /// 인리처 이름
    pub fn enricher_name(&self) -> &str {
        self.enricher.name()
    }

    /// JSON 값을 처리합니다. 최상위는 객체여야 합니다.
    pub async fn process_value(
        &self,
        raw: &Value,
        collector: Option<&str>,
    ) -> Result<DetectionResult, NormalizationError> {
        match raw {
            Value::Object(map) => self.process(map, collector).await,
            _ => {
                metrics::counter!(EVENTS_REJECTED_TOTAL).increment(1);
                warn!(reason = %NormalizationError::NotAnObject, "raw event rejected");
                Err(NormalizationError::NotAnObject)
            }
        }
    }

    /// 원시 이벤트 하나를 처리합니다.
    ///
    /// 정규화 실패만 에러로 반환합니다. 인리치먼트와 알림 실패는 내부에서 처리됩니다.
    pub async fn process(
        &self,
        raw: &Map<String, Value>,
        collector: Option<&str>,
    ) -> Result<DetectionResult, NormalizationError> {
        let event = self.normalizer.normalize(raw, collector).inspect_err(|e| {
            metrics::counter!(EVENTS_REJECTED_TOTAL).increment(1);
            warn!(reason = %e, collector = collector.unwrap_or("-"), "raw event rejected");
        })?;
        self.metrics.record_event(EventKind::Processed);

        let event = self.enrich(Arc::new(event)).await;

        let mut result = match &self.detector {
            Some(detector) => detector.evaluate(&event),
            None => DetectionResult::new(
                Arc::clone(&event),
                0.0,
                "no detector configured",
                NO_DETECTOR,
            ),
        };
        drop(event);
        self.metrics.record_score(&result.detector, result.score);

        if result.score >= self.anomaly_threshold {
            self.handle_anomaly(&mut result).await;
        } else {
            debug!(score = result.score, detector = %result.detector, "event below threshold");
        }

        Ok(result)
    }

    async fn enrich(&self, event: Arc<Event>) -> Arc<Event> {
        let EnrichmentResult { metadata, .. } = self.enricher.enrich(&event).await;
        if metadata.is_empty() {
            return event;
        }

        let mut event = event;
        Arc::make_mut(&mut event)
            .payload
            .insert(ENRICHMENT_KEY.to_owned(), Value::Object(metadata));
        event
    }

    async fn handle_anomaly(&self, result: &mut DetectionResult) {
        Arc::make_mut(&mut result.event).add_tag(TAG_ANOMALY);
        self.metrics.record_event(EventKind::Anomaly);

        let record = self
            .repository
            .add(
                result.score,
                result.description.clone(),
                Event::clone(&result.event),
            )
            .await;

        info!(
            id = record.id,
            score = result.score,
            detector = %result.detector,
            description = %result.description,
            "anomaly detected"
        );

        if let Some(dispatcher) = &self.dispatcher {
            let alert = Alert::from_detection(result);
            let outcomes = dispatcher.dispatch(&alert).await;
            let failed = outcomes.iter().filter(|o| !o.success).count();
            debug!(
                alert_id = %alert.id,
                channels = outcomes.len(),
                failed,
                "alert dispatched"
            );
        }
    }
}

impl std::fmt::Debug for PipelineProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineProcessor")
            .field("normalizer", &self.normalizer)
            .field("detector", &self.detector_name())
            .field("enricher", &self.enricher_name())
            .field("dispatcher", &self.dispatcher)
            .field("anomaly_threshold", &self.anomaly_threshold)
            .finish()
    }
}

/// 파이프라인 프로세서 빌더
///
/// 지정하지 않은 구성 요소는 기본값을 씁니다: 기본 정규화기, 탐지기 없음,
/// NoOp 인리처, 새 저장소, 알림 없음, 메트릭 없음, 임계값 0.5.
pub struct PipelineProcessorBuilder {
    normalizer: Normalizer,
    detector: Option<Box<dyn Detector>>,
    enricher: Option<Box<dyn DynEnricher>>,
    repository: Option<Arc<AnomalyRepository>>,
    dispatcher: Option<AlertDispatcher>,
    metrics: Option<Arc<dyn MetricsSink>>,
    anomaly_threshold: f64,
}

impl PipelineProcessorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            normalizer: Normalizer::default(),
            detector: None,
            enricher: None,
            repository: None,
            dispatcher: None,
            metrics: None,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }

    /// `[pipeline]` 설정을 적용합니다 (임계값, strict 주소 모드).
    pub fn config(mut self, config: &PipelineConfig) -> Self {
        self.anomaly_threshold = config.anomaly_threshold;
        self.normalizer = self
            .normalizer
            .with_strict_addresses(config.strict_addresses);
        self
    }

    /// 정규화기를 지정합니다.
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// 탐지기를 지정합니다.
    pub fn detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// 탐지기를 선택적으로 지정합니다. `None`이면 점수 0으로 처리합니다.
    pub fn maybe_detector(mut self, detector: Option<Box<dyn Detector>>) -> Self {
        self.detector = detector;
        self
    }

    /// 인리처를 지정합니다.
    pub fn enricher(mut self, enricher: Box<dyn DynEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// 공유 저장소를 지정합니다.
    pub fn repository(mut self, repository: Arc<AnomalyRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// 알림 디스패처를 지정합니다.
    pub fn dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// 메트릭 수집기를 지정합니다.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 알림 임계값을 지정합니다.
    pub fn anomaly_threshold(mut self, threshold: f64) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    /// 프로세서를 빌드합니다.
    ///
    /// # Errors
    ///
    /// 임계값이 [0, 1] 범위가 아니면 `PipelineError::Config`
    pub fn build(self) -> Result<PipelineProcessor, PipelineError> {
        if !(0.0..=1.0).contains(&self.anomaly_threshold) {
            return Err(PipelineError::Config {
                field: "pipeline.anomaly_threshold".to_owned(),
                reason: format!("must be in [0, 1], got {}", self.anomaly_threshold),
            });
        }

        let processor = PipelineProcessor {
            normalizer: self.normalizer,
            detector: self.detector,
            enricher: self.enricher.unwrap_or_else(|| Box::new(NoOpEnricher)),
            repository: self.repository.unwrap_or_default(),
            dispatcher: self.dispatcher,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
            anomaly_threshold: self.anomaly_threshold,
        };

        info!(
            detector = processor.detector_name(),
            enricher = processor.enricher_name(),
            threshold = processor.anomaly_threshold,
            "pipeline processor built"
        );
        Ok(processor)
    }
}

impl Default for PipelineProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use netsentry_core::error::AlertError;
    use netsentry_core::pipeline::{AlertChannel, DynAlertChannel, Enricher};
    use netsentry_core::types::Severity;

    use crate::detection::PortScanHeuristicDetector;

    #[derive(Default)]
    struct RecordingMetrics {
        events: Mutex<Vec<EventKind>>,
        scores: Mutex<Vec<(String, f64)>>,
    }

    impl MetricsSink for RecordingMetrics {
        fn record_event(&self, kind: EventKind) {
            self.events.lock().unwrap().push(kind);
        }

        fn record_score(&self, detector: &str, score: f64) {
            self.scores.lock().unwrap().push((detector.to_owned(), score));
        }
    }

    #[derive(Clone, Default)]
    struct CapturingChannel {
        alerts: Arc<Mutex<Vec<Alert>>>,
    }

    impl AlertChannel for CapturingChannel {
        fn name(&self) -> &str {
            "capture"
        }

        async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct FixedEnricher;

    impl Enricher for FixedEnricher {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn enrich(&self, event: &Arc<Event>) -> EnrichmentResult {
            let mut result = EnrichmentResult::empty(Arc::clone(event));
            result.metadata.insert("country".to_owned(), json!("KR"));
            result
        }
    }

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test input must be an object"),
        }
    }

    fn ssh_failure() -> Map<String, Value> {
        raw(json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "dst_ip": "10.0.0.1",
            "dst_port": 22,
            "protocol": "tcp",
            "message": "failed login attempt",
        }))
    }

    fn web_request() -> Map<String, Value> {
        raw(json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "dst_ip": "10.0.0.1",
            "dst_port": 8080,
            "protocol": "http",
        }))
    }

    #[tokio::test]
    async fn anomaly_is_stored_and_alerted() {
        let channel = CapturingChannel::default();
        let metrics = Arc::new(RecordingMetrics::default());
        let processor = PipelineProcessor::builder()
            .detector(Box::new(PortScanHeuristicDetector::default()))
            .dispatcher(AlertDispatcher::new(vec![
                Box::new(channel.clone()) as Box<dyn DynAlertChannel>
            ]))
            .metrics(metrics.clone())
            .build()
            .unwrap();

        let result = processor.process(&ssh_failure(), Some("syslog")).await.unwrap();
        assert!(result.is_anomaly());
        assert!((result.score - 0.8).abs() < 1e-9);
        assert!(result.event.has_tag(TAG_ANOMALY));

        let records = processor.repository().list_recent(10).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
        assert!(records[0].event.has_tag(TAG_ANOMALY));

        let alerts = channel.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].metadata["description"], "Sensitive service targeted");
        assert_eq!(alerts[0].metadata["score"], "0.80");

        assert_eq!(
            *metrics.events.lock().unwrap(),
            vec![EventKind::Processed, EventKind::Anomaly]
        );
        assert_eq!(metrics.scores.lock().unwrap()[0].0, "port-scan-heuristic");
    }

    #[tokio::test]
    async fn benign_event_is_not_stored() {
        let processor = PipelineProcessor::builder()
            .detector(Box::new(PortScanHeuristicDetector::default()))
            .build()
            .unwrap();

        let result = processor.process(&web_request(), None).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert!(!result.event.has_tag(TAG_ANOMALY));
        assert!(processor.repository().is_empty().await);
    }

    #[tokio::test]
    async fn missing_detector_scores_zero() {
        let processor = PipelineProcessor::builder().build().unwrap();
        let result = processor.process(&ssh_failure(), None).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.detector, "none");
        assert_eq!(processor.detector_name(), "none");
    }

    #[tokio::test]
    async fn zero_threshold_flags_every_event() {
        let processor = PipelineProcessor::builder()
            .anomaly_threshold(0.0)
            .build()
            .unwrap();
        processor.process(&web_request(), None).await.unwrap();
        assert_eq!(processor.repository().len().await, 1);
    }

    #[tokio::test]
    async fn normalization_error_is_propagated() {
        let metrics = Arc::new(RecordingMetrics::default());
        let processor = PipelineProcessor::builder()
            .metrics(metrics.clone())
            .build()
            .unwrap();

        let err = processor
            .process(&raw(json!({"src_ip": "invalid-ip"})), None)
            .await
            .unwrap_err();
        assert_eq!(err, NormalizationError::MissingTimestamp);
        assert!(metrics.events.lock().unwrap().is_empty());

        let err = processor.process_value(&json!([1, 2]), None).await.unwrap_err();
        assert_eq!(err, NormalizationError::NotAnObject);
    }

    #[tokio::test]
    async fn enrichment_is_merged_into_payload() {
        let processor = PipelineProcessor::builder()
            .enricher(Box::new(FixedEnricher))
            .build()
            .unwrap();

        let mut input = web_request();
        input.insert("enrichment".to_owned(), json!("stale"));
        let result = processor.process(&input, None).await.unwrap();
        assert_eq!(result.event.payload[ENRICHMENT_KEY], json!({"country": "KR"}));
    }

    #[tokio::test]
    async fn empty_enrichment_leaves_payload_alone() {
        let processor = PipelineProcessor::builder().build().unwrap();
        let result = processor.process(&web_request(), None).await.unwrap();
        assert!(!result.event.payload.contains_key(ENRICHMENT_KEY));
    }

    #[tokio::test]
    async fn shared_repository_sees_anomalies() {
        let repository = Arc::new(AnomalyRepository::new());
        let processor = PipelineProcessor::builder()
            .detector(Box::new(PortScanHeuristicDetector::default()))
            .repository(Arc::clone(&repository))
            .build()
            .unwrap();

        processor.process(&ssh_failure(), None).await.unwrap();
        processor.process(&ssh_failure(), None).await.unwrap();
        let ids: Vec<u64> = repository.list_recent(5).await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = PipelineProcessor::builder()
            .anomaly_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("anomaly_threshold"));
        assert!(PipelineProcessor::builder().anomaly_threshold(f64::NAN).build().is_err());
    }

    #[tokio::test]
    async fn pipeline_config_enables_strict_addresses() {
        let config = PipelineConfig {
            anomaly_threshold: 0.9,
            strict_addresses: true,
        };
        let processor = PipelineProcessor::builder().config(&config).build().unwrap();
        assert_eq!(processor.anomaly_threshold(), 0.9);

        let err = processor
            .process(&raw(json!({"timestamp": "2024-01-01T00:00:00Z"})), None)
            .await
            .unwrap_err();
        assert_eq!(err, NormalizationError::MissingAddress);
    }
}
