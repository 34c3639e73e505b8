//! JSON 배열 파일 수집기
//!
//! 파일 하나를 JSON 배열로 읽고 `batch_size` 단위로 정규화합니다.
//! 정규화에 실패한 레코드는 로그를 남기고 건너뛰며 거부 카운터를 올립니다.

use std::path::Path;

use serde_json::Value;
use tracing::warn;

use netsentry_core::event::Event;
use netsentry_core::metrics::EVENTS_REJECTED_TOTAL;

use super::{Collector, CollectorConfig};
use crate::error::PipelineError;
use crate::normalize::Normalizer;

const SOURCE_TYPE: &str = "json_file";

/// 파일을 읽어 JSON 배열의 원소를 반환합니다.
///
/// # Errors
///
/// 파일을 읽을 수 없으면 `Io`, JSON이 아니면 `Json`, 최상위가 배열이 아니면 `Collector`
pub async fn read_json_array(path: impl AsRef<Path>) -> Result<Vec<Value>, PipelineError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => Ok(items),
        other => Err(PipelineError::Collector {
            source_type: SOURCE_TYPE.to_owned(),
            reason: format!(
                "{}: expected a JSON array, found {}",
                path.display(),
                json_kind(&other)
            ),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON 배열 파일 수집기
#[derive(Debug)]
pub struct JsonFileCollector {
    name: String,
    batch_size: usize,
    normalizer: Normalizer,
    records: std::vec::IntoIter<Value>,
    rejected: usize,
}

impl JsonFileCollector {
    /// 파일을 읽어 수집기를 생성합니다.
    pub async fn open(
        path: impl AsRef<Path>,
        config: &CollectorConfig,
        normalizer: Normalizer,
    ) -> Result<Self, PipelineError> {
        let records = read_json_array(path).await?;
        Ok(Self::from_records(records, config, normalizer))
    }

    /// 이미 읽은 원시 레코드로 수집기를 생성합니다.
    pub fn from_records(records: Vec<Value>, config: &CollectorConfig, normalizer: Normalizer) -> Self {
        Self {
            name: config.name.clone(),
            batch_size: config.batch_size.max(1),
            normalizer,
            records: records.into_iter(),
            rejected: 0,
        }
    }

    /// 지금까지 거부된 레코드 수
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// 아직 읽지 않은 레코드 수
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl Collector for JsonFileCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<Event>>, PipelineError> {
        while !self.records.as_slice().is_empty() {
            let mut batch = Vec::with_capacity(self.batch_size.min(self.records.len()));
            for (index, raw) in self.records.by_ref().take(self.batch_size).enumerate() {
                match self.normalizer.normalize_value(&raw, Some(self.name.as_str())) {
                    Ok(event) => batch.push(event),
                    Err(e) => {
                        self.rejected += 1;
                        metrics::counter!(EVENTS_REJECTED_TOTAL).increment(1);
                        warn!(collector = %self.name, index, reason = %e, "record rejected");
                    }
                }
            }
            if !batch.is_empty() {
                return Ok(Some(batch));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn record(port: u16) -> Value {
        json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "src_ip": "192.168.1.10",
            "dst_port": port,
            "protocol": "TCP",
        })
    }

    #[tokio::test]
    async fn yields_batches_of_configured_size() {
        let records = (0..5).map(record).collect();
        let config = CollectorConfig::new("file").with_batch_size(2);
        let mut collector = JsonFileCollector::from_records(records, &config, Normalizer::default());

        let mut sizes = Vec::new();
        while let Some(batch) = collector.next_batch().await.unwrap() {
            assert!(batch.iter().all(|e| e.collector.as_deref() == Some("file")));
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(collector.remaining(), 0);
    }

    #[tokio::test]
    async fn rejected_records_are_skipped_and_counted() {
        let records = vec![
            record(22),
            json!({"src_ip": "invalid-ip"}),
            json!("not an object"),
            record(23),
        ];
        let config = CollectorConfig::new("file").with_batch_size(10);
        let mut collector = JsonFileCollector::from_records(records, &config, Normalizer::default());

        let batch = collector.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(collector.rejected(), 2);
        assert!(collector.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fully_rejected_chunk_moves_on() {
        let records = vec![json!({}), json!({}), record(80)];
        let config = CollectorConfig::new("file").with_batch_size(2);
        let mut collector = JsonFileCollector::from_records(records, &config, Normalizer::default());

        let batch = collector.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].destination_port, Some(80));
    }

    #[tokio::test]
    async fn opens_json_array_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json!([record(22), record(443)])).unwrap();

        let config = CollectorConfig::new("file");
        let mut collector = JsonFileCollector::open(file.path(), &config, Normalizer::default())
            .await
            .unwrap();
        assert_eq!(collector.next_batch().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_array_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", json!({"timestamp": 0})).unwrap();

        let err = read_json_array(file.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Collector { .. }));
        assert!(err.to_string().contains("object"));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = read_json_array("/nonexistent/netsentry/events.json")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
