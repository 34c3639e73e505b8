//! 큐 모듈 -- 다운스트림 전송 프로듀서
//!
//! 수집기는 이벤트 배치를 [`QueueProducer`](netsentry_core::pipeline::QueueProducer)로
//! 넘깁니다. 배치는 전부 성공하거나 전부 실패하며, 빈 배치는 항상 성공합니다.
//!
//! 백엔드는 설정 시점에 고릅니다. 네트워크 클라이언트는 [`QueueClients`]로 주입합니다.
//!
//! | 백엔드 | 프로듀서 | 클라이언트 |
//! |--------|----------|------------|
//! | `memory` | [`InMemoryQueueProducer`] | 없음 |
//! | `redis` | [`RedisStreamProducer`] | [`StreamClient`] |
//! | `kafka` | [`KafkaTopicProducer`] | [`TopicClient`] |

pub mod kafka;
pub mod memory;
pub mod redis;
pub mod retry;
pub mod wire;

pub use kafka::{KafkaTopicProducer, TopicClient};
pub use memory::InMemoryQueueProducer;
pub use redis::{RedisStreamProducer, StreamClient};
pub use retry::RetryPolicy;
pub use wire::WireEvent;

#[cfg(feature = "redis")]
pub use redis::RedisStreamClient;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use netsentry_core::config::QueueConfig;
use netsentry_core::pipeline::DynQueueProducer;

use crate::error::PipelineError;

/// 큐 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueBackendKind {
    /// 프로세스 메모리
    Memory,
    /// Redis 스트림
    Redis,
    /// Kafka 토픽
    Kafka,
}

impl QueueBackendKind {
    /// 설정 값 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Kafka => "kafka",
        }
    }
}

impl fmt::Display for QueueBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueBackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "kafka" => Ok(Self::Kafka),
            other => Err(PipelineError::Config {
                field: "queue.backend".to_owned(),
                reason: format!("unsupported queue backend: {other}"),
            }),
        }
    }
}

/// 네트워크 백엔드용 주입 클라이언트
#[derive(Clone, Default)]
pub struct QueueClients {
    /// Redis 스트림 클라이언트
    pub stream: Option<Arc<dyn StreamClient>>,
    /// Kafka 클라이언트
    pub topic: Option<Arc<dyn TopicClient>>,
}

impl QueueClients {
    /// 활성화된 feature로 설정의 클라이언트를 만듭니다.
    ///
    /// `redis` feature가 켜져 있고 백엔드가 redis면 redis-rs 클라이언트를 만듭니다.
    /// Kafka 클라이언트는 호출자가 주입해야 합니다.
    pub fn from_config(config: &QueueConfig) -> Result<Self, PipelineError> {
        #[allow(unused_mut)]
        let mut clients = Self::default();

        #[cfg(feature = "redis")]
        if config.backend.eq_ignore_ascii_case("redis") {
            let client = RedisStreamClient::open(&config.redis_url).map_err(|e| {
                PipelineError::Config {
                    field: "queue.redis_url".to_owned(),
                    reason: e.to_string(),
                }
            })?;
            clients.stream = Some(Arc::new(client));
        }
        #[cfg(not(feature = "redis"))]
        let _ = config;

        Ok(clients)
    }
}

/// 설정된 백엔드의 프로듀서를 만듭니다.
///
/// # Errors
///
/// 백엔드 이름이 잘못되었거나 필요한 클라이언트가 주입되지 않으면 `PipelineError::Config`
pub fn build_producer(
    config: &QueueConfig,
    clients: QueueClients,
) -> Result<Box<dyn DynQueueProducer>, PipelineError> {
    let kind: QueueBackendKind = config.backend.parse()?;
    let retry = RetryPolicy::from_config(config);

    let missing_client = |feature: &str| PipelineError::Config {
        field: "queue.backend".to_owned(),
        reason: format!("{kind} backend requires a client ({feature})"),
    };

    let producer: Box<dyn DynQueueProducer> = match kind {
        QueueBackendKind::Memory => Box::new(InMemoryQueueProducer::new()),
        QueueBackendKind::Redis => {
            let client = clients
                .stream
                .ok_or_else(|| missing_client("enable the 'redis' feature"))?;
            Box::new(RedisStreamProducer::new(&config.stream_name, client, retry))
        }
        QueueBackendKind::Kafka => {
            let client = clients
                .topic
                .ok_or_else(|| missing_client("inject a TopicClient"))?;
            Box::new(KafkaTopicProducer::new(&config.kafka_topic, client, retry))
        }
    };

    info!(
        backend = producer.backend(),
        max_attempts = retry.max_attempts(),
        "queue producer ready"
    );
    Ok(producer)
}
