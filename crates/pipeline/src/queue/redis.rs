//! Redis 스트림 프로듀서
//!
//! 이벤트마다 XADD 하나를 보내며, 한 시도 안의 XADD는 동시에 실행합니다.
//! 하나라도 실패하면 배치 전체를 처음부터 다시 보냅니다 (중복 전달 가능).

use std::sync::Arc;

use futures::TryFutureExt;
use futures::future::try_join_all;
use tracing::debug;

use netsentry_core::error::{QueueSendError, TransportError};
use netsentry_core::event::Event;
use netsentry_core::metrics::{LABEL_BACKEND, QUEUE_EVENTS_SENT_TOTAL};
use netsentry_core::pipeline::{BoxFuture, QueueProducer, QueueResult};

use super::retry::RetryPolicy;
use super::wire::WireEvent;

const BACKEND: &str = "redis";

/// 스트림 추가 capability
pub trait StreamClient: Send + Sync {
    /// 스트림에 엔트리 하나를 추가합니다.
    fn xadd<'a>(
        &'a self,
        stream: &'a str,
        fields: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Redis 스트림 프로듀서
pub struct RedisStreamProducer {
    stream: String,
    client: Arc<dyn StreamClient>,
    retry: RetryPolicy,
}

impl RedisStreamProducer {
    /// 프로듀서를 생성합니다.
    pub fn new(stream: impl Into<String>, client: Arc<dyn StreamClient>, retry: RetryPolicy) -> Self {
        Self {
            stream: stream.into(),
            client,
            retry,
        }
    }

    /// 대상 스트림 이름
    pub fn stream(&self) -> &str {
        &self.stream
    }
}

impl QueueProducer for RedisStreamProducer {
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

        let records: Vec<Vec<(String, String)>> = events
            .iter()
            .map(|event| WireEvent::from(event).to_stream_fields())
            .collect();
        let records = &records;

        let attempts = self
            .retry
            .run(BACKEND, move |_attempt| {
                try_join_all(
                    records
                        .iter()
                        .map(move |fields| self.client.xadd(&self.stream, fields)),
                )
                .map_ok(|_| ())
            })
            .await?;

        metrics::counter!(QUEUE_EVENTS_SENT_TOTAL, LABEL_BACKEND => BACKEND)
            .increment(events.len() as u64);
        debug!(stream = %self.stream, count = events.len(), attempts, "batch sent");

        Ok(QueueResult {
            count: events.len(),
            attempts,
        })
    }
}

// ─── redis-rs ────────────────────────────────────────────────────────

#[cfg(feature = "redis")]
pub use client::RedisStreamClient;

#[cfg(feature = "redis")]
mod client {
    use redis::aio::MultiplexedConnection;
    use tokio::sync::OnceCell;

    use netsentry_core::error::TransportError;
    use netsentry_core::pipeline::BoxFuture;

    use super::StreamClient;

    /// redis-rs 기반 스트림 클라이언트
    ///
    /// 첫 전송 때 한 번만 연결하고 이후 멀티플렉스 연결을 공유합니다.
    /// 연결에 실패하면 다음 전송에서 다시 연결합니다.
    pub struct RedisStreamClient {
        client: redis::Client,
        connection: OnceCell<MultiplexedConnection>,
    }

    impl RedisStreamClient {
        /// URL을 검증하고 클라이언트를 생성합니다. 연결은 하지 않습니다.
        pub fn open(url: &str) -> Result<Self, TransportError> {
            let client =
                redis::Client::open(url).map_err(|e| TransportError::Connection(e.to_string()))?;
            Ok(Self {
                client,
                connection: OnceCell::new(),
            })
        }

        async fn connection(&self) -> Result<MultiplexedConnection, TransportError> {
            self.connection
                .get_or_try_init(|| async {
                    self.client
                        .get_multiplexed_async_connection()
                        .await
                        .map_err(|e| TransportError::Connection(e.to_string()))
                })
                .await
                .cloned()
        }
    }

    impl StreamClient for RedisStreamClient {
        fn xadd<'a>(
            &'a self,
            stream: &'a str,
            fields: &'a [(String, String)],
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            Box::pin(async move {
                let mut conn = self.connection().await?;
                let _id: String = redis::cmd("XADD")
                    .arg(stream)
                    .arg("*")
                    .arg(fields)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| TransportError::Send(e.to_string()))?;
                Ok(())
            })
        }
    }

}
