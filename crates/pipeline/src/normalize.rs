//! 원시 이벤트 정규화
//!
//! 수집기마다 필드 이름이 다르므로 필드별 별칭 목록([`FieldAliases`])을 앞에서부터
//! 시도합니다. 시도한 키는 값이 비어 있어도 payload에서 제거되고,
//! 값을 준 키 뒤에 있는 별칭은 건드리지 않고 payload에 남깁니다.
//!
//! # 사용 예시
//! ```
//! use netsentry_pipeline::normalize::Normalizer;
//!
//! let raw = serde_json::json!({
//!     "timestamp": "2024-01-01T00:00:00Z",
//!     "src_port": "1234",
//!     "protocol": "TCP",
//!     "message": "hello",
//! });
//! let event = Normalizer::default().normalize_value(&raw, Some("syslog")).unwrap();
//! assert_eq!(event.source_port, Some(1234));
//! assert_eq!(event.protocol.as_deref(), Some("tcp"));
//! assert!(event.payload.contains_key("message"));
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use netsentry_core::error::NormalizationError;
use netsentry_core::event::Event;

/// 필드별 별칭 목록
///
/// 앞에 있는 키가 우선합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    /// 타임스탬프 키 (기본: timestamp, time, @timestamp)
    pub timestamp: Vec<String>,
    /// 출발지 IP 키 (기본: src_ip, source_ip, client_ip)
    pub source_ip: Vec<String>,
    /// 목적지 IP 키 (기본: dst_ip, destination_ip, server_ip)
    pub destination_ip: Vec<String>,
    /// 출발지 포트 키 (기본: src_port, source_port)
    pub source_port: Vec<String>,
    /// 목적지 포트 키 (기본: dst_port, destination_port)
    pub destination_port: Vec<String>,
    /// 프로토콜 키 (기본: protocol, proto)
    pub protocol: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            timestamp: keys(&["timestamp", "time", "@timestamp"]),
            source_ip: keys(&["src_ip", "source_ip", "client_ip"]),
            destination_ip: keys(&["dst_ip", "destination_ip", "server_ip"]),
            source_port: keys(&["src_port", "source_port"]),
            destination_port: keys(&["dst_port", "destination_port"]),
            protocol: keys(&["protocol", "proto"]),
        }
    }
}

/// 원시 매핑을 [`Event`]로 변환하는 정규화기
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: FieldAliases,
    strict_addresses: bool,
}

impl Normalizer {
    /// 커스텀 별칭으로 정규화기를 생성합니다.
    pub fn new(aliases: FieldAliases) -> Self {
        Self {
            aliases,
            strict_addresses: false,
        }
    }

    /// 출발지/목적지 주소가 모두 없는 이벤트를 거부합니다.
    pub fn with_strict_addresses(mut self, strict: bool) -> Self {
        self.strict_addresses = strict;
        self
    }

    /// 별칭 설정
    pub fn aliases(&self) -> &FieldAliases {
        &self.aliases
    }

    /// JSON 값을 정규화합니다. 최상위는 객체여야 합니다.
    pub fn normalize_value(
        &self,
        raw: &Value,
        collector: Option<&str>,
    ) -> Result<Event, NormalizationError> {
        match raw {
            Value::Object(map) => self.normalize(map, collector),
            _ => Err(NormalizationError::NotAnObject),
        }
    }

    /// 원시 매핑을 정규화합니다.
    ///
    /// 실패하면 부분 결과 없이 에러를 반환합니다.
    pub fn normalize(
        &self,
        raw: &Map<String, Value>,
        collector: Option<&str>,
    ) -> Result<Event, NormalizationError> {
        let mut payload = raw.clone();

        let timestamp = take_first(&mut payload, &self.aliases.timestamp, is_falsy, parse_timestamp)?
            .ok_or(NormalizationError::MissingTimestamp)?;
        let source_ip = take_first(&mut payload, &self.aliases.source_ip, is_falsy, parse_ip)?;
        let destination_ip =
            take_first(&mut payload, &self.aliases.destination_ip, is_falsy, parse_ip)?;
        let source_port = take_first(&mut payload, &self.aliases.source_port, Value::is_null, parse_port)?;
        let destination_port = take_first(
            &mut payload,
            &self.aliases.destination_port,
            Value::is_null,
            parse_port,
        )?;
        let protocol = take_first(&mut payload, &self.aliases.protocol, Value::is_null, |_, v| {
            Ok(parse_protocol(v))
        })?;

        if self.strict_addresses && source_ip.is_none() && destination_ip.is_none() {
            return Err(NormalizationError::MissingAddress);
        }

        let mut event = Event::new(timestamp)
            .with_source(source_ip, source_port)
            .with_destination(destination_ip, destination_port);
        event.protocol = protocol;
        event.payload = payload;
        event.raw = Value::Object(raw.clone());
        event.collector = collector.map(str::to_owned);
        Ok(event)
    }
}

/// 별칭을 순서대로 제거하며 첫 번째 유효한 값을 파싱합니다.
///
/// `skip`에 해당하는 값은 제거만 하고 다음 별칭으로 넘어갑니다.
fn take_first<T>(
    payload: &mut Map<String, Value>,
    aliases: &[String],
    skip: impl Fn(&Value) -> bool,
    parse: impl Fn(&str, &Value) -> Result<T, NormalizationError>,
) -> Result<Option<T>, NormalizationError> {
    for key in aliases {
        let Some(value) = payload.remove(key) else {
            continue;
        };
        if skip(&value) {
            continue;
        }
        return parse(key, &value).map(Some);
    }
    Ok(None)
}

/// null, false, 0, 빈 문자열/배열/객체
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 타임스탬프를 파싱합니다.
///
/// 지원 형식:
/// - RFC 3339 (`2024-01-15T12:00:00Z`, `2024-01-15T12:00:00+09:00`)
/// - 오프셋 없는 ISO 8601 (UTC로 간주)
/// - 날짜만 (`2024-01-15`, 자정 UTC)
/// - Unix timestamp (초, 소수 허용)
fn parse_timestamp(field: &str, value: &Value) -> Result<DateTime<Utc>, NormalizationError> {
    let parsed = match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        _ => None,
    };
    parsed.ok_or_else(|| NormalizationError::InvalidTimestamp {
        field: field.to_owned(),
        value: display_value(value),
    })
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    // f64 -> i64 변환은 범위를 벗어나면 포화되고, 이후 from_timestamp가 거부합니다
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// IP 주소를 파싱합니다. 정수는 u32 범위면 IPv4, 그 이상이면 IPv6로 해석합니다.
fn parse_ip(field: &str, value: &Value) -> Result<IpAddr, NormalizationError> {
    let parsed = match value {
        Value::String(s) => s.parse::<IpAddr>().ok(),
        Value::Number(n) => n.as_u64().map(|v| match u32::try_from(v) {
            Ok(v4) => IpAddr::V4(Ipv4Addr::from(v4)),
            Err(_) => IpAddr::V6(Ipv6Addr::from(u128::from(v))),
        }),
        _ => None,
    };
    parsed.ok_or_else(|| NormalizationError::InvalidAddress {
        field: field.to_owned(),
        value: display_value(value),
    })
}

/// 포트를 정수로 변환합니다. 실수는 버림, 불리언은 0/1입니다.
fn parse_port(field: &str, value: &Value) -> Result<u16, NormalizationError> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    number
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| NormalizationError::InvalidNumber {
            field: field.to_owned(),
            value: display_value(value),
        })
}

fn parse_protocol(value: &Value) -> String {
    display_value(value).to_lowercase()
}
