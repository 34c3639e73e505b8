//! 수집 모듈 -- 이벤트 배치를 만들어 싱크로 넘깁니다.
//!
//! # 구성
//! - [`Collector`]: 배치를 소진될 때까지 생산하는 소스
//! - [`BatchSink`]: 배치를 받는 쪽 ([`QueueSink`]는 큐 프로듀서로 전달)
//! - [`run_collector`]: 수집기 하나를 끝까지 실행하는 루프
//!
//! # 종료
//! 종료 신호([`CancellationToken`])는 배치 사이에서만 확인합니다.
//! 처리 중인 배치는 중단하지 않습니다.

pub mod file;

pub use file::{JsonFileCollector, read_json_array};

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use netsentry_core::event::Event;
use netsentry_core::pipeline::DynQueueProducer;

use crate::error::PipelineError;

/// 기본 배치 크기
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// 수집기 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// 수집기 이름 (이벤트의 collector 필드에 기록됨)
    pub name: String,
    /// 배치당 최대 원시 레코드 수
    pub batch_size: usize,
    /// false면 실행하지 않음
    pub enabled: bool,
}

impl CollectorConfig {
    /// 기본값으로 설정을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            enabled: true,
        }
    }

    /// 배치 크기를 지정합니다. 0은 1로 취급합니다.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// 활성화 여부를 지정합니다.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 수집기 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 비활성화되어 실행하지 않음
    Disabled,
    /// 소스를 모두 소진함
    Exhausted,
    /// 종료 신호로 멈춤
    Cancelled,
}

/// 수집기 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorReport {
    /// 종료 상태
    pub status: CollectorStatus,
    /// 싱크로 넘긴 배치 수
    pub batches: usize,
    /// 싱크로 넘긴 이벤트 수
    pub events: usize,
}

/// 이벤트 배치 소스
pub trait Collector: Send {
    /// 수집기 이름
    fn name(&self) -> &str;

    /// 다음 배치를 반환합니다. 소진되면 `None`입니다.
    fn next_batch(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<Event>>, PipelineError>> + Send;
}

/// 배치를 받는 싱크
pub trait BatchSink: Send + Sync {
    /// 배치 하나를 처리합니다.
    fn handle_batch(&self, batch: Vec<Event>) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// 큐 프로듀서로 배치를 넘기는 싱크
#[derive(Clone)]
pub struct QueueSink {
    producer: Arc<dyn DynQueueProducer>,
}

impl QueueSink {
    /// 싱크를 생성합니다.
    pub fn new(producer: Arc<dyn DynQueueProducer>) -> Self {
        Self { producer }
    }

    /// 대상 프로듀서
    pub fn producer(&self) -> &Arc<dyn DynQueueProducer> {
        &self.producer
    }
}

impl BatchSink for QueueSink {
    async fn handle_batch(&self, batch: Vec<Event>) -> Result<(), PipelineError> {
        let result = self.producer.send_batch(&batch).await?;
        debug!(
            backend = self.producer.backend(),
            count = result.count,
            attempts = result.attempts,
            "batch delivered"
        );
        Ok(())
    }
}

/// 수집기를 소진되거나 종료 신호가 올 때까지 실행합니다.
///
/// 싱크 에러는 그대로 반환하며, 이때 남은 배치는 처리하지 않습니다.
pub async fn run_collector<C, S>(
    config: &CollectorConfig,
    collector: &mut C,
    sink: &S,
    cancel: &CancellationToken,
) -> Result<CollectorReport, PipelineError>
where
    C: Collector,
    S: BatchSink,
{
    let mut report = CollectorReport {
        status: CollectorStatus::Disabled,
        batches: 0,
        events: 0,
    };

    if !config.enabled {
        info!(collector = %config.name, "collector disabled, skipping");
        return Ok(report);
    }

    info!(collector = %config.name, batch_size = config.batch_size, "collector started");

    report.status = loop {
        if cancel.is_cancelled() {
            break CollectorStatus::Cancelled;
        }
        let Some(batch) = collector.next_batch().await? else {
            break CollectorStatus::Exhausted;
        };
        if batch.is_empty() {
            continue;
        }

        let count = batch.len();
        sink.handle_batch(batch).await?;
        report.batches += 1;
        report.events += count;
    };

    info!(
        collector = %config.name,
        status = ?report.status,
        batches = report.batches,
        events = report.events,
        "collector finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::net::IpAddr;

    use chrono::Utc;

    use crate::queue::InMemoryQueueProducer;

    struct ScriptedCollector {
        batches: VecDeque<Vec<Event>>,
        pulled: usize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedCollector {
        fn new(batches: Vec<Vec<Event>>) -> Self {
            Self {
                batches: batches.into(),
                pulled: 0,
                cancel_after: None,
            }
        }
    }

    impl Collector for ScriptedCollector {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn next_batch(&mut self) -> Result<Option<Vec<Event>>, PipelineError> {
            self.pulled += 1;
            if let Some((after, token)) = &self.cancel_after {
                if self.pulled == *after {
                    token.cancel();
                }
            }
            Ok(self.batches.pop_front())
        }
    }

    fn event(protocol: &str, src: Option<&str>) -> Event {
        Event::new(Utc::now())
            .with_source(src.map(|ip| ip.parse::<IpAddr>().unwrap()), None)
            .with_protocol(protocol)
    }

    #[tokio::test]
    async fn batches_reach_the_queue() {
        let queue = Arc::new(InMemoryQueueProducer::new());
        let sink = QueueSink::new(queue.clone());
        let mut collector = ScriptedCollector::new(vec![
            vec![event("tcp", Some("192.168.1.10"))],
            vec![event("udp", Some("10.0.0.5")), event("syslog", None)],
        ]);

        let report = run_collector(
            &CollectorConfig::new("simple").with_batch_size(2),
            &mut collector,
            &sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, CollectorStatus::Exhausted);
        assert_eq!(report.batches, 2);
        assert_eq!(report.events, 3);

        let drained = queue.drain().await;
        let mut protocols: Vec<_> = drained.iter().filter_map(|e| e.protocol.clone()).collect();
        protocols.sort();
        assert_eq!(protocols, vec!["syslog", "tcp", "udp"]);
    }

    #[tokio::test]
    async fn disabled_collector_does_not_run() {
        let queue = Arc::new(InMemoryQueueProducer::new());
        let mut collector = ScriptedCollector::new(vec![vec![event("tcp", None)]]);

        let report = run_collector(
            &CollectorConfig::new("off").with_enabled(false),
            &mut collector,
            &QueueSink::new(queue.clone()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, CollectorStatus::Disabled);
        assert_eq!(collector.pulled, 0);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn cancellation_finishes_the_current_batch() {
        let queue = Arc::new(InMemoryQueueProducer::new());
        let cancel = CancellationToken::new();
        let mut collector = ScriptedCollector::new(vec![
            vec![event("tcp", None), event("tcp", None)],
            vec![event("udp", None)],
        ]);
        // 첫 배치를 가져오는 도중 취소 -> 그 배치는 끝까지 전달됨
        collector.cancel_after = Some((1, cancel.clone()));

        let report = run_collector(
            &CollectorConfig::new("c"),
            &mut collector,
            &QueueSink::new(queue.clone()),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.status, CollectorStatus::Cancelled);
        assert_eq!(report.events, 2);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn already_cancelled_token_stops_before_first_batch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut collector = ScriptedCollector::new(vec![vec![event("tcp", None)]]);

        let report = run_collector(
            &CollectorConfig::new("c"),
            &mut collector,
            &QueueSink::new(Arc::new(InMemoryQueueProducer::new())),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(report.status, CollectorStatus::Cancelled);
        assert_eq!(collector.pulled, 0);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        assert_eq!(CollectorConfig::new("x").with_batch_size(0).batch_size, 1);
    }
}
