//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! 비동기 확장 포인트는 RPITIT로 정의하고, `Vec<Box<dyn ...>>`로 보관할 수 있도록
//! `BoxFuture`를 반환하는 `Dyn*` 짝 trait을 함께 제공합니다.
//! 원래 trait을 구현하면 `Dyn*` trait은 자동으로 구현됩니다.
//!
//! 두 trait이 모두 스코프에 있을 때 구체 타입에서 메서드를 호출하면 모호해지므로
//! `Enricher::enrich(&x, &event)`처럼 완전 경로로 호출합니다.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{AlertError, QueueSendError};
use crate::event::{DetectionResult, EnrichmentResult, Event};
use crate::types::Alert;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── Detector ────────────────────────────────────────────────────────

/// 이벤트에 이상 점수를 매기는 탐지기
///
/// 탐지는 순수 계산이므로 동기 trait입니다.
/// 학습이 필요한 탐지기는 학습이 끝난 타입만 이 trait을 구현합니다.
pub trait Detector: Send + Sync {
    /// 탐지기 이름
    fn name(&self) -> &str;

    /// 이벤트를 평가합니다. 점수는 항상 [0, 1] 범위입니다.
    fn evaluate(&self, event: &Arc<Event>) -> DetectionResult;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, event: &Arc<Event>) -> DetectionResult {
        (**self).evaluate(event)
    }
}

// ─── Enricher ────────────────────────────────────────────────────────

/// 이벤트에 부가 정보를 붙이는 인리처
///
/// 실패하지 않습니다. 조회 실패는 빈 메타데이터로 처리합니다.
pub trait Enricher: Send + Sync {
    /// 인리처 이름 (복합 인리처에서 메타데이터 키로 사용)
    fn name(&self) -> &str;

    /// 이벤트를 인리치합니다.
    fn enrich(&self, event: &Arc<Event>) -> impl Future<Output = EnrichmentResult> + Send;
}

/// dyn-compatible 인리처 trait
pub trait DynEnricher: Send + Sync {
    /// 인리처 이름
    fn name(&self) -> &str;

    /// 이벤트를 인리치합니다.
    fn enrich<'a>(&'a self, event: &'a Arc<Event>) -> BoxFuture<'a, EnrichmentResult>;
}

impl<T: Enricher> DynEnricher for T {
    fn name(&self) -> &str {
        Enricher::name(self)
    }

    fn enrich<'a>(&'a self, event: &'a Arc<Event>) -> BoxFuture<'a, EnrichmentResult> {
        Box::pin(Enricher::enrich(self, event))
    }
}

// ─── AlertChannel ────────────────────────────────────────────────────

/// 알림 전송 채널
///
/// 설정이 불완전한 채널은 에러 없이 아무것도 하지 않습니다.
pub trait AlertChannel: Send + Sync {
    /// 채널 이름 (email, slack 등)
    fn name(&self) -> &str;

    /// 알림을 전송합니다.
    fn send(&self, alert: &Alert) -> impl Future<Output = Result<(), AlertError>> + Send;
}

/// dyn-compatible 알림 채널 trait
pub trait DynAlertChannel: Send + Sync {
    /// 채널 이름
    fn name(&self) -> &str;

    /// 알림을 전송합니다.
    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), AlertError>>;
}

impl<T: AlertChannel> DynAlertChannel for T {
    fn name(&self) -> &str {
        AlertChannel::name(self)
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), AlertError>> {
        Box::pin(AlertChannel::send(self, alert))
    }
}

// ─── QueueProducer ───────────────────────────────────────────────────

/// 배치 전송 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueResult {
    /// 전송한 이벤트 수
    pub count: usize,
    /// 성공까지 걸린 시도 횟수 (빈 배치는 0)
    pub attempts: u32,
}

/// 다운스트림 큐로 이벤트 배치를 넘기는 프로듀서
///
/// 배치는 전부 성공하거나 전부 실패합니다. 빈 배치는 항상 성공합니다.
pub trait QueueProducer: Send + Sync {
    /// 백엔드 이름 (memory, redis, kafka)
    fn backend(&self) -> &str;

    /// 배치를 전송합니다.
    fn send_batch(
        &self,
        events: &[Event],
    ) -> impl Future<Output = Result<QueueResult, QueueSendError>> + Send;
}

/// dyn-compatible 큐 프로듀서 trait
pub trait DynQueueProducer: Send + Sync {
    /// 백엔드 이름
    fn backend(&self) -> &str;

    /// 배치를 전송합니다.
    fn send_batch<'a>(
        &'a self,
        events: &'a [Event],
    ) -> BoxFuture<'a, Result<QueueResult, QueueSendError>>;
}

impl<T: QueueProducer> DynQueueProducer for T {
    fn backend(&self) -> &str {
        QueueProducer::backend(self)
    }

    fn send_batch<'a>(
        &'a self,
        events: &'a [Event],
    ) -> BoxFuture<'a, Result<QueueResult, QueueSendError>> {
        Box::pin(QueueProducer::send_batch(self, events))
    }
}
