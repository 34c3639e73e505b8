//! 큐 와이어 레코드
//!
//! 네트워크 백엔드로 보내는 평면 레코드입니다. payload와 tags는 포함하지 않습니다.
//! Redis는 문자열 필드로, Kafka는 JSON 바이트로 보냅니다.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use netsentry_core::error::TransportError;
use netsentry_core::event::Event;

/// 평면 이벤트 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// RFC 3339 타임스탬프
    pub timestamp: String,
    /// 출발지 IP (없으면 빈 문자열)
    pub source_ip: String,
    /// 목적지 IP (없으면 빈 문자열)
    pub destination_ip: String,
    /// 출발지 포트 (없으면 0)
    pub source_port: u16,
    /// 목적지 포트 (없으면 0)
    pub destination_port: u16,
    /// 프로토콜 (없으면 빈 문자열)
    pub protocol: String,
    /// 수집기 ID (없으면 빈 문자열)
    pub collector: String,
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: event.timestamp.to_rfc3339(),
            source_ip: event.source_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            destination_ip: event
                .destination_ip
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            source_port: event.source_port.unwrap_or(0),
            destination_port: event.destination_port.unwrap_or(0),
            protocol: event.protocol.clone().unwrap_or_default(),
            collector: event.collector.clone().unwrap_or_default(),
        }
    }
}

impl WireEvent {
    /// Redis 스트림 필드 목록 (필드 순서 고정)
    pub fn to_stream_fields(&self) -> Vec<(String, String)> {
        vec![
            ("timestamp".to_owned(), self.timestamp.clone()),
            ("source_ip".to_owned(), self.source_ip.clone()),
            ("destination_ip".to_owned(), self.destination_ip.clone()),
            ("source_port".to_owned(), self.source_port.to_string()),
            ("destination_port".to_owned(), self.destination_port.to_string()),
            ("protocol".to_owned(), self.protocol.clone()),
            ("collector".to_owned(), self.collector.clone()),
        ]
    }

    /// Kafka 메시지 값 (JSON)
    pub fn to_json_bytes(&self) -> Result<Bytes, TransportError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TransportError::Encode(e.to_string()))
    }
}
