//! 인메모리 큐 프로듀서 (테스트, 로컬 실행용)

use tokio::sync::Mutex;

use netsentry_core::error::QueueSendError;
use netsentry_core::event::Event;
use netsentry_core::metrics::{LABEL_BACKEND, QUEUE_EVENTS_SENT_TOTAL};
use netsentry_core::pipeline::{QueueProducer, QueueResult};

const BACKEND: &str = "memory";

/// 이벤트를 메모리에 쌓는 프로듀서
#[derive(Debug, Default)]
pub struct InMemoryQueueProducer {
    events: Mutex<Vec<Event>>,
}

impl InMemoryQueueProducer {
    /// 빈 프로듀서를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 쌓인 이벤트를 모두 꺼내고 비웁니다.
    pub async fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().await)
    }

    /// 쌓인 이벤트 수
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// 비어 있는지 여부
    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }
}

impl QueueProducer for InMemoryQueueProducer {
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

        self.events.lock().await.extend_from_slice(events);
        metrics::counter!(QUEUE_EVENTS_SENT_TOTAL, LABEL_BACKEND => BACKEND)
            .increment(events.len() as u64);

        Ok(QueueResult {
            count: events.len(),
            attempts: 1,
        })
    }
}
