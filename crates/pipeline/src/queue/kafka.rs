//! Kafka 토픽 프로듀서
//!
//! 클라이언트는 [`TopicClient`]로 주입합니다. 수명 주기는 `Idle -> Started -> Closed`이며
//! 하나의 [`RwLock`]으로 보호합니다.
//!
//! - 시작은 첫 전송 시도에서 쓰기 잠금을 잡고 한 번만 일어납니다. 시작에 실패하면
//!   `Idle`로 남고 다음 시도에서 다시 시작합니다.
//! - 전송은 읽기 잠금을 잡은 채로 진행합니다.
//! - [`KafkaTopicProducer::close`]는 쓰기 잠금을 기다리므로 진행 중인 시작과 전송이
//!   끝난 뒤에 클라이언트를 멈춥니다. 닫힌 뒤의 전송은 [`TransportError::Closed`]로
//!   바로 실패합니다.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use netsentry_core::error::{QueueSendError, TransportError};
use netsentry_core::event::Event;
use netsentry_core::metrics::{LABEL_BACKEND, QUEUE_EVENTS_SENT_TOTAL};
use netsentry_core::pipeline::{BoxFuture, QueueProducer, QueueResult};

use super::retry::RetryPolicy;
use super::wire::WireEvent;

const BACKEND: &str = "kafka";

/// Kafka 프로듀서 capability
pub trait TopicClient: Send + Sync {
    /// 브로커에 연결합니다.
    fn start(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// 메시지 하나를 보내고 확인을 기다립니다.
    fn send_and_wait<'a>(
        &'a self,
        topic: &'a str,
        value: Bytes,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// 연결을 닫습니다.
    fn stop(&self) -> BoxFuture<'_, Result<(), TransportError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Started,
    Closed,
}

/// Kafka 토픽 프로듀서
pub struct KafkaTopicProducer {
    topic: String,
    client: Arc<dyn TopicClient>,
    retry: RetryPolicy,
    state: RwLock<Lifecycle>,
}

impl KafkaTopicProducer {
    /// 프로듀서를 생성합니다. 클라이언트는 첫 전송 때 시작합니다.
    pub fn new(topic: impl Into<String>, client: Arc<dyn TopicClient>, retry: RetryPolicy) -> Self {
        Self {
            topic: topic.into(),
            client,
            retry,
            state: RwLock::new(Lifecycle::Idle),
        }
    }

    /// 대상 토픽 이름
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 클라이언트가 시작되었고 아직 닫히지 않았는지 여부
    pub async fn is_started(&self) -> bool {
        *self.state.read().await == Lifecycle::Started
    }

    /// 시작된 상태의 읽기 잠금을 반환합니다. 필요하면 클라이언트를 시작합니다.
    async fn acquire_started(&self) -> Result<RwLockReadGuard<'_, Lifecycle>, TransportError> {
        let state = self.state.read().await;
        let current = *state;
        match current {
            Lifecycle::Started => return Ok(state),
            Lifecycle::Closed => return Err(TransportError::Closed),
            Lifecycle::Idle => drop(state),
        }

        let mut state = self.state.write().await;
        let current = *state;
        match current {
            Lifecycle::Closed => return Err(TransportError::Closed),
            Lifecycle::Started => {}
            Lifecycle::Idle => {
                self.client.start().await?;
                *state = Lifecycle::Started;
                info!(topic = %self.topic, "kafka producer started");
            }
        }
        Ok(state.downgrade())
    }

    /// 클라이언트를 닫습니다. 시작하지 않았거나 이미 닫혔으면 클라이언트를 건드리지 않습니다.
    ///
    /// 닫은 뒤의 전송은 [`TransportError::Closed`]로 실패합니다.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut *state, Lifecycle::Closed);
        if previous == Lifecycle::Started {
            self.client.stop().await?;
            info!(topic = %self.topic, "kafka producer stopped");
        }
        Ok(())
    }

    async fn attempt(&self, payloads: &[Bytes]) -> Result<(), TransportError> {
        let _started = self.acquire_started().await?;
        try_join_all(
            payloads
                .iter()
                .map(|value| self.client.send_and_wait(&self.topic, value.clone())),
        )
        .await?;
        Ok(())
    }
}

impl QueueProducer for KafkaTopicProducer {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn send_batch(&self, events: &[Event]) -> Result<QueueResult, QueueSendError> {
        if events.is_empty() {
            return Ok(QueueResult {
                count: 0,
                attempts: 0,
            });
        }

        let payloads = events
            .iter()
            .map(|event| WireEvent::from(event).to_json_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| QueueSendError {
                backend: BACKEND.to_owned(),
                attempts: 0,
                source,
            })?;
        let payloads = payloads.as_slice();

        let attempts = self
            .retry
            .run(BACKEND, move |_attempt| self.attempt(payloads))
            .await?;

        metrics::counter!(QUEUE_EVENTS_SENT_TOTAL, LABEL_BACKEND => BACKEND)
            .increment(events.len() as u64);
        debug!(topic = %self.topic, count = events.len(), attempts, "batch sent");

        Ok(QueueResult {
            count: events.len(),
            attempts,
        })
    }
}
