//! 인리치먼트 모듈 -- 이벤트에 부가 정보를 붙입니다.
//!
//! 인리처는 실패하지 않습니다. 조회 capability가 없거나, 이벤트에 IP가 없거나,
//! 조회가 실패하면 빈 메타데이터를 반환합니다.
//!
//! [`CompositeEnricher`]는 하위 인리처를 순서대로 실행하고 각 결과를 인리처 이름
//! 아래에 넣은 2단계 맵을 만듭니다. 모든 하위 인리처는 같은 원본 이벤트를 봅니다.

pub mod lookup;

pub use lookup::{AsnReader, AsnRecord, GeoIpReader, GeoRecord, IpTable};

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use netsentry_core::config::EnrichmentConfig;
use netsentry_core::error::LookupError;
use netsentry_core::event::{EnrichmentResult, Event};
use netsentry_core::pipeline::{DynEnricher, Enricher};

/// 조회 대상 IP: 출발지, 없으면 목적지
fn lookup_ip(event: &Event) -> Option<IpAddr> {
    event.source_ip.or(event.destination_ip)
}

fn insert_some(metadata: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        metadata.insert(key.to_owned(), value.into());
    }
}

// ─── NoOp ────────────────────────────────────────────────────────────

/// 항상 빈 메타데이터를 반환하는 인리처
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEnricher;

impl Enricher for NoOpEnricher {
    fn name(&self) -> &str {
        "noop"
    }

    async fn enrich(&self, event: &Arc<Event>) -> EnrichmentResult {
        EnrichmentResult::empty(Arc::clone(event))
    }
}

// ─── GeoIP ───────────────────────────────────────────────────────────

/// 위치 정보 인리처
#[derive(Clone, Default)]
pub struct GeoIpEnricher {
    reader: Option<Arc<dyn GeoIpReader>>,
}

impl GeoIpEnricher {
    /// 인리처 이름
    pub const NAME: &'static str = "geoip";

    /// 조회 capability로 생성합니다.
    pub fn new(reader: Arc<dyn GeoIpReader>) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// 조회 capability 없이 생성합니다. 항상 빈 메타데이터를 반환합니다.
    pub fn disabled() -> Self {
        Self::default()
    }
}

impl Enricher for GeoIpEnricher {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn enrich(&self, event: &Arc<Event>) -> EnrichmentResult {
        let (Some(reader), Some(ip)) = (&self.reader, lookup_ip(event)) else {
            return EnrichmentResult::empty(Arc::clone(event));
        };

        let record = match reader.city(ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(enricher = Self::NAME, error = %e, "lookup failed");
                return EnrichmentResult::empty(Arc::clone(event));
            }
        };

        let mut metadata = Map::new();
        insert_some(&mut metadata, "country", record.country);
        insert_some(&mut metadata, "country_name", record.country_name);
        insert_some(&mut metadata, "city", record.city);
        insert_some(&mut metadata, "latitude", record.latitude);
        insert_some(&mut metadata, "longitude", record.longitude);

        EnrichmentResult {
            event: Arc::clone(event),
            metadata,
        }
    }
}

// ─── ASN ─────────────────────────────────────────────────────────────

/// AS 정보 인리처
#[derive(Clone, Default)]
pub struct AsnEnricher {
    reader: Option<Arc<dyn AsnReader>>,
}

impl AsnEnricher {
    /// 인리처 이름
    pub const NAME: &'static str = "asn";

    /// 조회 capability로 생성합니다.
    pub fn new(reader: Arc<dyn AsnReader>) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// 조회 capability 없이 생성합니다.
    pub fn disabled() -> Self {
        Self::default()
    }
}

impl Enricher for AsnEnricher {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn enrich(&self, event: &Arc<Event>) -> EnrichmentResult {
        let (Some(reader), Some(ip)) = (&self.reader, lookup_ip(event)) else {
            return EnrichmentResult::empty(Arc::clone(event));
        };

        let record = match reader.asn(ip) {
            Ok(record) => record,
            Err(e) => {
                debug!(enricher = Self::NAME, error = %e, "lookup failed");
                return EnrichmentResult::empty(Arc::clone(event));
            }
        };

        let mut metadata = Map::new();
        insert_some(&mut metadata, "asn", record.asn);
        insert_some(&mut metadata, "asn_org", record.asn_org);

        EnrichmentResult {
            event: Arc::clone(event),
            metadata,
        }
    }
}

// ─── Composite ───────────────────────────────────────────────────────

/// 하위 인리처를 순서대로 실행하는 인리처
#[derive(Default)]
pub struct CompositeEnricher {
    enrichers: Vec<Box<dyn DynEnricher>>,
}

impl CompositeEnricher {
    /// 하위 인리처 목록으로 생성합니다.
    pub fn new(enrichers: Vec<Box<dyn DynEnricher>>) -> Self {
        Self { enrichers }
    }

    /// 하위 인리처 수
    pub fn len(&self) -> usize {
        self.enrichers.len()
    }

    /// 하위 인리처가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.enrichers.is_empty()
    }
}

impl Enricher for CompositeEnricher {
    fn name(&self) -> &str {
        "composite"
    }

    async fn enrich(&self, event: &Arc<Event>) -> EnrichmentResult {
        let mut metadata = Map::new();
        for enricher in &self.enrichers {
            let result = enricher.enrich(event).await;
            metadata.insert(enricher.name().to_owned(), Value::Object(result.metadata));
        }
        EnrichmentResult {
            event: Arc::clone(event),
            metadata,
        }
    }
}

/// 주어진 조회 capability로 인리처를 조립합니다.
///
/// 없으면 [`NoOpEnricher`], 하나면 해당 인리처, 둘이면 [`CompositeEnricher`]입니다.
pub fn build_enricher(
    geoip: Option<Arc<dyn GeoIpReader>>,
    asn: Option<Arc<dyn AsnReader>>,
) -> Box<dyn DynEnricher> {
    let mut enrichers: Vec<Box<dyn DynEnricher>> = Vec::new();
    if let Some(reader) = geoip {
        enrichers.push(Box::new(GeoIpEnricher::new(reader)));
    }
    if let Some(reader) = asn {
        enrichers.push(Box::new(AsnEnricher::new(reader)));
    }

    match enrichers.len() {
        0 => Box::new(NoOpEnricher),
        1 => enrichers.remove(0),
        _ => Box::new(CompositeEnricher::new(enrichers)),
    }
}

/// 설정된 데이터베이스 파일을 열어 인리처를 조립합니다.
pub async fn enricher_from_config(
    config: &EnrichmentConfig,
) -> Result<Box<dyn DynEnricher>, LookupError> {
    let geoip: Option<Arc<dyn GeoIpReader>> = match config.geoip_db_path() {
        Some(path) => Some(Arc::new(IpTable::<GeoRecord>::open(path).await?)),
        None => None,
    };
    let asn: Option<Arc<dyn AsnReader>> = match config.asn_db_path() {
        Some(path) => Some(Arc::new(IpTable::<AsnRecord>::open(path).await?)),
        None => None,
    };

    let enricher = build_enricher(geoip, asn);
    info!(enricher = enricher.name(), "enricher ready");
    Ok(enricher)
}
