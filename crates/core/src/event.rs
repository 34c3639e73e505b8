//! 이벤트 모델 -- 파이프라인을 흐르는 정규화된 텔레메트리 레코드
//!
//! [`Event`]는 정규화기가 만들고, 인리처와 탐지기가 읽으며,
//! 이상으로 판정되면 저장소와 알림 채널로 넘어갑니다.
//! [`DetectionResult`]와 [`EnrichmentResult`]는 같은 이벤트를 `Arc`로 공유합니다.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 이상 이벤트에 붙는 태그
pub const TAG_ANOMALY: &str = "anomaly";

/// 인리치먼트 메타데이터가 병합되는 payload 예약 키
pub const ENRICHMENT_KEY: &str = "enrichment";

/// `is_anomaly` 판정 기준 점수 (오케스트레이터 임계값과 독립)
pub const ANOMALY_SCORE_CUTOFF: f64 = 0.5;

/// 정규화된 네트워크 텔레메트리 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 발생 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 출발지 IP
    pub source_ip: Option<IpAddr>,
    /// 목적지 IP
    pub destination_ip: Option<IpAddr>,
    /// 출발지 포트
    pub source_port: Option<u16>,
    /// 목적지 포트
    pub destination_port: Option<u16>,
    /// 프로토콜 (소문자)
    pub protocol: Option<String>,
    /// 정규화에서 소비되지 않은 나머지 필드
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// 원본 입력
    #[serde(default)]
    pub raw: Value,
    /// 태그 집합
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// 수집기 식별자
    pub collector: Option<String>,
}

impl Event {
    /// 주어진 시각으로 빈 이벤트를 생성합니다.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            source_ip: None,
            destination_ip: None,
            source_port: None,
            destination_port: None,
            protocol: None,
            payload: Map::new(),
            raw: Value::Null,
            tags: BTreeSet::new(),
            collector: None,
        }
    }

    /// 출발지 주소와 포트를 설정합니다.
    pub fn with_source(mut self, ip: Option<IpAddr>, port: Option<u16>) -> Self {
        self.source_ip = ip;
        self.source_port = port;
        self
    }

    /// 목적지 주소와 포트를 설정합니다.
    pub fn with_destination(mut self, ip: Option<IpAddr>, port: Option<u16>) -> Self {
        self.destination_ip = ip;
        self.destination_port = port;
        self
    }

    /// 프로토콜을 소문자로 설정합니다.
    pub fn with_protocol(mut self, protocol: impl AsRef<str>) -> Self {
        self.protocol = Some(protocol.as_ref().to_lowercase());
        self
    }

    /// payload 필드를 추가합니다.
    pub fn with_payload_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// 태그를 추가합니다. 이미 있으면 false를 반환합니다.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// 태그 포함 여부
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// payload의 `message` 필드가 문자열일 때만 반환합니다.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// 출발지와 목적지가 모두 있고 같은 주소인지 확인합니다.
    pub fn is_loopback_flow(&self) -> bool {
        matches!(
            (self.source_ip, self.destination_ip),
            (Some(src), Some(dst)) if src == dst
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{} proto={}",
            self.timestamp.to_rfc3339(),
            display_ip(self.source_ip),
            self.source_port.unwrap_or(0),
            display_ip(self.destination_ip),
            self.destination_port.unwrap_or(0),
            self.protocol.as_deref().unwrap_or("-"),
        )
    }
}

/// 주소를 문자열로, 없으면 `"unknown"`
pub fn display_ip(ip: Option<IpAddr>) -> String {
    ip.map_or_else(|| "unknown".to_owned(), |ip| ip.to_string())
}

/// 탐지 결과
///
/// 점수는 생성 시점에 [0, 1]로 고정됩니다. NaN은 0으로 취급합니다.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    /// 평가한 이벤트
    pub event: Arc<Event>,
    /// 이상 점수
    pub score: f64,
    /// 설명
    pub description: String,
    /// 탐지기 이름
    pub detector: String,
}

impl DetectionResult {
    /// 점수를 고정하여 결과를 생성합니다.
    pub fn new(
        event: Arc<Event>,
        score: f64,
        description: impl Into<String>,
        detector: impl Into<String>,
    ) -> Self {
        Self {
            event,
            score: clamp_score(score),
            description: description.into(),
            detector: detector.into(),
        }
    }

    /// 점수가 0.5 이상인지 여부
    pub fn is_anomaly(&self) -> bool {
        self.score >= ANOMALY_SCORE_CUTOFF
    }
}

/// 점수를 [0, 1] 범위로 고정합니다.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// 인리치먼트 결과
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    /// 대상 이벤트
    pub event: Arc<Event>,
    /// 부가 메타데이터
    pub metadata: Map<String, Value>,
}

impl EnrichmentResult {
    /// 메타데이터 없는 결과
    pub fn empty(event: Arc<Event>) -> Self {
        Self {
            event,
            metadata: Map::new(),
        }
    }

    /// 메타데이터가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        Event::new(Utc::now())
            .with_source(Some("10.0.0.5".parse().unwrap()), Some(40000))
            .with_destination(Some("10.0.0.1".parse().unwrap()), Some(22))
            .with_protocol("TCP")
    }

    #[test]
    fn protocol_is_lowercased() {
        assert_eq!(sample().protocol.as_deref(), Some("tcp"));
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut event = sample();
        assert!(event.add_tag(TAG_ANOMALY));
        assert!(!event.add_tag(TAG_ANOMALY));
        assert_eq!(event.tags.len(), 1);
    }

    #[test]
    fn message_only_returns_strings() {
        let event = sample().with_payload_field("message", Value::from(42));
        assert!(event.message().is_none());
        let event = sample().with_payload_field("message", Value::from("failed login"));
        assert_eq!(event.message(), Some("failed login"));
    }

    #[test]
    fn loopback_requires_both_addresses() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let event = Event::new(Utc::now()).with_source(Some(ip), None);
        assert!(!event.is_loopback_flow());
        let event = event.with_destination(Some(ip), None);
        assert!(event.is_loopback_flow());
    }

    #[test]
    fn detection_result_clamps_score() {
        let event = Arc::new(sample());
        assert_eq!(DetectionResult::new(event.clone(), 1.7, "x", "d").score, 1.0);
        assert_eq!(DetectionResult::new(event.clone(), -0.2, "x", "d").score, 0.0);
        assert_eq!(DetectionResult::new(event, f64::NAN, "x", "d").score, 0.0);
    }

    #[test]
    fn is_anomaly_uses_fixed_cutoff() {
        let event = Arc::new(sample());
        assert!(DetectionResult::new(event.clone(), 0.5, "x", "d").is_anomaly());
        assert!(!DetectionResult::new(event, 0.49, "x", "d").is_anomaly());
    }

    #[test]
    fn event_serde_roundtrip_keeps_tags() {
        let mut event = sample();
        event.add_tag("anomaly");
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
