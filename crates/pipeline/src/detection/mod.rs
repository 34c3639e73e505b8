//! 탐지 모듈 -- 이벤트 이상 점수 계산
//!
//! - [`PortScanHeuristicDetector`]: 민감 포트 휴리스틱
//! - [`IsolationForestDetector`]: 기준 이벤트로 학습하는 비지도 모델
//! - [`CompositeDetector`]: 하위 탐지기 중 최대 점수

pub mod composite;
pub mod forest;
pub mod heuristic;

pub use composite::CompositeDetector;
pub use forest::{
    FeatureVector, FittedIsolationForestDetector, IsolationForestDetector, IsolationForestParams,
    feature_vector,
};
pub use heuristic::{DEFAULT_SENSITIVE_PORTS, PortScanHeuristicDetector};

use tracing::{info, warn};

use netsentry_core::config::DetectorConfig;
use netsentry_core::error::DetectionError;
use netsentry_core::event::Event;
use netsentry_core::pipeline::Detector;

/// 설정에 따라 탐지기를 조립합니다.
///
/// | kind | 결과 |
/// |------|------|
/// | `none` | `None` |
/// | `heuristic` | 휴리스틱 |
/// | `isolation-forest` | `baseline`으로 학습한 모델 (비어 있으면 에러) |
/// | `composite` | 휴리스틱 + (`baseline`이 있으면) 학습한 모델 |
pub fn build_detector(
    config: &DetectorConfig,
    baseline: &[Event],
) -> Result<Option<Box<dyn Detector>>, DetectionError> {
    let heuristic = || PortScanHeuristicDetector::new(config.sensitive_ports.iter().copied());
    let forest = || -> Result<FittedIsolationForestDetector, DetectionError> {
        IsolationForestDetector::new(IsolationForestParams::from(config))?.fit(baseline)
    };

    let detector: Box<dyn Detector> = match config.kind.as_str() {
        "none" => return Ok(None),
        "heuristic" => Box::new(heuristic()),
        "isolation-forest" => Box::new(forest()?),
        "composite" => {
            let mut composite = CompositeDetector::new(vec![Box::new(heuristic())]);
            if baseline.is_empty() {
                warn!("composite detector has no baseline events, isolation forest disabled");
            } else {
                composite.push(Box::new(forest()?));
            }
            Box::new(composite)
        }
        other => {
            return Err(DetectionError::InvalidParameter {
                name: "kind".to_owned(),
                reason: format!("unknown detector kind '{other}'"),
            });
        }
    };

    info!(
        detector = detector.name(),
        baseline = baseline.len(),
        "detector ready"
    );
    Ok(Some(detector))
}
