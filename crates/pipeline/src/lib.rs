#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`normalize`]: 원시 매핑을 [`Event`](netsentry_core::Event)로 변환
//! - [`detection`]: 휴리스틱, 격리 포레스트, 복합 탐지기
//! - [`enrichment`]: GeoIP/ASN 조회 인리처와 복합 인리처
//! - [`processor`]: 정규화부터 알림까지 순서대로 실행하는 오케스트레이터
//! - [`repository`]: 이상 레코드 저장소
//! - [`alert`]: 알림 디스패처와 email/slack 채널
//! - [`queue`]: 큐 프로듀서와 재시도 정책
//! - [`collector`]: 배치 수집기 실행 루프
//! - [`error`]: 도메인 에러 타입

pub mod alert;
pub mod collector;
pub mod detection;
pub mod enrichment;
pub mod error;
pub mod normalize;
pub mod processor;
pub mod queue;
pub mod repository;

// --- 주요 타입 re-export ---

// 프로세서
pub use processor::{PipelineProcessor, PipelineProcessorBuilder};

// 정규화
pub use normalize::{FieldAliases, Normalizer};

// 탐지
pub use detection::{
    CompositeDetector, FittedIsolationForestDetector, IsolationForestDetector,
    IsolationForestParams, PortScanHeuristicDetector, build_detector,
};

// 인리치먼트
pub use enrichment::{
    AsnEnricher, CompositeEnricher, GeoIpEnricher, NoOpEnricher, build_enricher,
    enricher_from_config,
};

// 저장소
pub use repository::AnomalyRepository;

// 알림
pub use alert::{AlertDispatcher, DispatchOutcome, EmailChannel, SlackChannel};

// 큐
pub use queue::{
    InMemoryQueueProducer, KafkaTopicProducer, QueueBackendKind, QueueClients,
    RedisStreamProducer, RetryPolicy, build_producer,
};

// 수집기
pub use collector::{
    BatchSink, Collector, CollectorConfig, CollectorReport, CollectorStatus, JsonFileCollector,
    QueueSink, run_collector,
};

// 에러
pub use error::PipelineError;
