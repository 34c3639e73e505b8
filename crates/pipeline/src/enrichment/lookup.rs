//! IP 조회 capability -- GeoIP / ASN
//!
//! 인리처는 [`GeoIpReader`], [`AsnReader`] trait에만 의존합니다.
//! 기본 구현 [`IpTable`]은 IP 문자열을 키로 하는 JSON 객체 파일을 읽습니다.
//!
//! ```json
//! { "203.0.113.5": { "country": "KR", "city": "Seoul" } }
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use netsentry_core::error::LookupError;

/// GeoIP 조회 결과
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeoRecord {
    /// ISO 국가 코드
    pub country: Option<String>,
    /// 국가 이름
    pub country_name: Option<String>,
    /// 도시 이름
    pub city: Option<String>,
    /// 위도
    pub latitude: Option<f64>,
    /// 경도
    pub longitude: Option<f64>,
}

/// ASN 조회 결과
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AsnRecord {
    /// AS 번호
    pub asn: Option<u32>,
    /// AS 운영 조직
    pub asn_org: Option<String>,
}

/// IP → 위치 정보 조회
pub trait GeoIpReader: Send + Sync {
    /// 주소의 위치 정보를 조회합니다.
    fn city(&self, ip: IpAddr) -> Result<GeoRecord, LookupError>;
}

/// IP → AS 정보 조회
pub trait AsnReader: Send + Sync {
    /// 주소의 AS 정보를 조회합니다.
    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError>;
}

/// 정확히 일치하는 IP만 조회하는 테이블
#[derive(Debug, Clone, Default)]
pub struct IpTable<R> {
    entries: HashMap<IpAddr, R>,
}

impl<R: DeserializeOwned> IpTable<R> {
    /// 파일에서 테이블을 읽습니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LookupError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::parse(&content).map_err(|reason| LookupError::Open {
            path: path.display().to_string(),
            reason,
        })
    }

    /// JSON 문자열에서 테이블을 만듭니다.
    pub fn parse(content: &str) -> Result<Self, String> {
        let raw: HashMap<String, R> = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, record) in raw {
            let ip: IpAddr = key
                .parse()
                .map_err(|_| format!("invalid ip address key: {key}"))?;
            entries.insert(ip, record);
        }
        Ok(Self { entries })
    }
}

impl<R> IpTable<R> {
    /// 항목을 추가합니다.
    pub fn insert(&mut self, ip: IpAddr, record: R) {
        self.entries.insert(ip, record);
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, ip: IpAddr) -> Result<&R, LookupError> {
        self.entries.get(&ip).ok_or_else(|| LookupError::Query {
            ip: ip.to_string(),
            reason: "address not found".to_owned(),
        })
    }
}

impl<R> FromIterator<(IpAddr, R)> for IpTable<R> {
    fn from_iter<I: IntoIterator<Item = (IpAddr, R)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl GeoIpReader for IpTable<GeoRecord> {
    fn city(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        self.get(ip).cloned()
    }
}

impl AsnReader for IpTable<AsnRecord> {
    fn asn(&self, ip: IpAddr) -> Result<AsnRecord, LookupError> {
        self.get(ip).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_geo_table() {
        let table: IpTable<GeoRecord> =
            IpTable::parse(r#"{"203.0.113.5": {"country": "KR", "latitude": 37.5}}"#).unwrap();
        let record = table.city("203.0.113.5".parse().unwrap()).unwrap();
        assert_eq!(record.country.as_deref(), Some("KR"));
        assert_eq!(record.latitude, Some(37.5));
        assert!(record.city.is_none());
    }

    #[test]
    fn unknown_address_is_query_error() {
        let table: IpTable<AsnRecord> = IpTable::default();
        let err = table.asn("10.0.0.1".parse().unwrap()).unwrap_err();
        assert!(matches!(err, LookupError::Query { .. }));
    }

    #[test]
    fn invalid_key_is_rejected() {
        let err = IpTable::<AsnRecord>::parse(r#"{"not-an-ip": {}}"#).unwrap_err();
        assert!(err.contains("not-an-ip"));
    }

    #[tokio::test]
    async fn open_missing_file() {
        let err = IpTable::<GeoRecord>::open("/nonexistent/netsentry-geo.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Open { .. }));
    }

    #[tokio::test]
    async fn open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asn.json");
        tokio::fs::write(&path, r#"{"2001:db8::1": {"asn": 64500, "asn_org": "Example"}}"#)
            .await
            .unwrap();
        let table = IpTable::<AsnRecord>::open(&path).await.unwrap();
        assert_eq!(table.len(), 1);
        let record = table.asn("2001:db8::1".parse().unwrap()).unwrap();
        assert_eq!(record.asn, Some(64500));
    }
}
