//! 큐 전송 재시도 정책
//!
//! 시도 `n`이 실패하면 `backoff_base × n`만큼 쉬고 다시 시도합니다.
//! 마지막 시도 뒤에는 쉬지 않고 마지막 원인을 담은 [`QueueSendError`]를 반환합니다.
//! 재시도할 수 없는 에러([`TransportError::is_retryable`])는 그 시도에서 바로 반환합니다.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use netsentry_core::config::QueueConfig;
use netsentry_core::error::{QueueSendError, TransportError};
use netsentry_core::metrics::{LABEL_BACKEND, QUEUE_RETRIES_TOTAL, QUEUE_SEND_FAILURES_TOTAL};

/// 기본 최대 시도 횟수
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 기본 백오프 단위
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// 선형 백오프 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// 정책을 생성합니다. 최대 시도 횟수는 최소 1입니다.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// `[queue]` 설정에서 정책을 만듭니다.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// 최대 시도 횟수
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 시도 `attempt`(1부터) 실패 후의 대기 시간
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    /// `attempt_fn`을 성공할 때까지 실행하고 성공한 시도 번호를 반환합니다.
    ///
    /// `attempt_fn`은 시도 번호(1부터)를 받습니다.
    pub async fn run<F, Fut>(&self, backend: &str, mut attempt_fn: F) -> Result<u32, QueueSendError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match attempt_fn(attempt).await {
                Ok(()) => return Ok(attempt),
                Err(e) if !e.is_retryable() => {
                    error!(backend, attempt, error = %e, "queue send failed, not retryable");
                    metrics::counter!(QUEUE_SEND_FAILURES_TOTAL, LABEL_BACKEND => backend.to_owned())
                        .increment(1);
                    return Err(QueueSendError {
                        backend: backend.to_owned(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        let backoff = self.backoff(attempt);
                        warn!(
                            backend,
                            attempt,
                            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            error = %e,
                            "queue send failed, retrying"
                        );
                        metrics::counter!(QUEUE_RETRIES_TOTAL, LABEL_BACKEND => backend.to_owned())
                            .increment(1);
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let source =
            last_error.unwrap_or_else(|| TransportError::Send("no attempt was made".to_owned()));
        error!(
            backend,
            attempts = self.max_attempts,
            error = %source,
            "queue send failed, retries exhausted"
        );
        metrics::counter!(QUEUE_SEND_FAILURES_TOTAL, LABEL_BACKEND => backend.to_owned())
            .increment(1);

        Err(QueueSendError {
            backend: backend.to_owned(),
            attempts: self.max_attempts,
            source,
        })
    }
}
