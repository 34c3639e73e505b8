//! 복합 탐지기 -- 하위 탐지기 중 가장 높은 점수를 채택합니다.

use std::sync::Arc;

use netsentry_core::event::{DetectionResult, Event};
use netsentry_core::pipeline::Detector;

/// 여러 탐지기를 묶는 탐지기
///
/// 동점이면 먼저 등록된 탐지기의 결과가 남습니다.
/// 하위 탐지기가 없으면 점수 0을 반환합니다.
#[derive(Default)]
pub struct CompositeDetector {
    detectors: Vec<Box<dyn Detector>>,
}

impl CompositeDetector {
    /// 탐지기 이름
    pub const NAME: &'static str = "composite";

    /// 하위 탐지기 목록으로 생성합니다.
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// 하위 탐지기를 추가합니다.
    pub fn push(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    /// 하위 탐지기 수
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// 하위 탐지기가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// 하위 탐지기 이름 목록
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }
}

impl Detector for CompositeDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, event: &Arc<Event>) -> DetectionResult {
        let mut best: Option<DetectionResult> = None;
        for detector in &self.detectors {
            let result = detector.evaluate(event);
            match &best {
                Some(current) if result.score <= current.score => {}
                _ => best = Some(result),
            }
        }
        best.unwrap_or_else(|| DetectionResult::new(Arc::clone(event), 0.0, "no detectors", "none"))
    }
}

impl std::fmt::Debug for CompositeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeDetector")
            .field("detectors", &self.detector_names())
            .finish()
    }
}
