//! Isolation Forest 탐지기
//!
//! 학습 전 타입([`IsolationForestDetector`])과 학습 후 타입
//! ([`FittedIsolationForestDetector`])을 분리합니다. [`Detector`]는 학습 후 타입만
//! 구현하므로 학습하지 않은 모델로 평가하는 코드는 컴파일되지 않습니다.
//!
//! ```compile_fail
//! use std::sync::Arc;
//! use netsentry_core::event::Event;
//! use netsentry_core::pipeline::Detector;
//! use netsentry_pipeline::detection::IsolationForestDetector;
//!
//! let untrained = IsolationForestDetector::default();
//! let event = Arc::new(Event::new(chrono::Utc::now()));
//! untrained.evaluate(&event);
//! ```
//!
//! # 점수 정규화
//!
//! 원시 점수는 `s - offset`입니다. `s`는 표준 이상 점수 `2^(-E[h(x)] / c(ψ))`이고,
//! `offset`은 학습 데이터 점수의 `(1 - contamination)` 분위수입니다.
//! 원시 점수는 `(raw + 1) / 2`로 [0, 1]에 매핑되므로 0.5 이상이면 이상입니다.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use netsentry_core::config::DetectorConfig;
use netsentry_core::error::DetectionError;
use netsentry_core::event::{DetectionResult, Event};
use netsentry_core::pipeline::Detector;

/// 특징 벡터 차원
pub const FEATURE_COUNT: usize = 5;

/// 이벤트 특징 벡터
///
/// `[src_port, dst_port, protocol_code, payload_len, tag_count]`
pub type FeatureVector = [f64; FEATURE_COUNT];

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// 이벤트를 특징 벡터로 변환합니다. 없는 포트는 0입니다.
pub fn feature_vector(event: &Event) -> FeatureVector {
    [
        f64::from(event.source_port.unwrap_or(0)),
        f64::from(event.destination_port.unwrap_or(0)),
        protocol_code(event.protocol.as_deref()),
        event.payload.len() as f64,
        event.tags.len() as f64,
    ]
}

fn protocol_code(protocol: Option<&str>) -> f64 {
    match protocol {
        Some("tcp") => 1.0,
        Some("udp") => 2.0,
        Some("icmp") => 3.0,
        Some("http") => 4.0,
        Some("https") => 5.0,
        Some("ssh") => 6.0,
        _ => 0.0,
    }
}

/// Isolation Forest 하이퍼파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForestParams {
    /// 트리 수
    pub n_estimators: usize,
    /// 예상 이상 비율 (0, 0.5]
    pub contamination: f64,
    /// 트리당 최대 샘플 수
    pub max_samples: usize,
    /// 난수 시드. `None`이면 엔트로피에서 초기화합니다.
    pub seed: Option<u64>,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.1,
            max_samples: 256,
            seed: None,
        }
    }
}

impl From<&DetectorConfig> for IsolationForestParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            contamination: config.contamination,
            max_samples: config.max_samples,
            seed: Some(config.seed),
        }
    }
}

impl IsolationForestParams {
    fn validate(&self) -> Result<(), DetectionError> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if self.max_samples == 0 {
            return Err(invalid("max_samples", "must be at least 1"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid("contamination", "must be within (0, 0.5]"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> DetectionError {
    DetectionError::InvalidParameter {
        name: name.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 학습 전 Isolation Forest
#[derive(Debug, Clone, Default)]
pub struct IsolationForestDetector {
    params: IsolationForestParams,
}

impl IsolationForestDetector {
    /// 탐지기 이름
    pub const NAME: &'static str = "isolation-forest";

    /// 파라미터를 검증하고 탐지기를 생성합니다.
    pub fn new(params: IsolationForestParams) -> Result<Self, DetectionError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// 하이퍼파라미터
    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }

    /// 기준 이벤트로 모델을 학습합니다.
    ///
    /// # Errors
    ///
    /// - 학습 데이터가 비어 있으면 `DetectionError::EmptyTrainingSet`
    /// - 파라미터가 범위를 벗어나면 `DetectionError::InvalidParameter`
    pub fn fit(self, events: &[Event]) -> Result<FittedIsolationForestDetector, DetectionError> {
        self.params.validate()?;
        if events.is_empty() {
            return Err(DetectionError::EmptyTrainingSet);
        }

        let data: Vec<FeatureVector> = events.iter().map(feature_vector).collect();
        let sample_size = self.params.max_samples.min(data.len());
        let max_depth = max_depth_for(sample_size);

        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let trees = (0..self.params.n_estimators)
            .map(|_| {
                let sample: Vec<FeatureVector> =
                    rand::seq::index::sample(&mut rng, data.len(), sample_size)
                        .into_iter()
                        .map(|i| data[i])
                        .collect();
                build_tree(&sample, 0, max_depth, &mut rng)
            })
            .collect();

        let mut fitted = FittedIsolationForestDetector {
            params: self.params,
            trees,
            sample_size,
            offset: 0.0,
        };

        let mut training_scores: Vec<f64> =
            data.iter().map(|x| fitted.anomaly_score(x)).collect();
        fitted.offset = percentile(&mut training_scores, 1.0 - fitted.params.contamination);

        debug!(
            trees = fitted.trees.len(),
            sample_size,
            offset = fitted.offset,
            "isolation forest fitted"
        );
        Ok(fitted)
    }
}

/// 학습을 마친 Isolation Forest
#[derive(Debug, Clone)]
pub struct FittedIsolationForestDetector {
    params: IsolationForestParams,
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl FittedIsolationForestDetector {
    /// 하이퍼파라미터
    pub fn params(&self) -> &IsolationForestParams {
        &self.params
    }

    /// 트리 수
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// 학습 데이터에서 계산한 판정 기준 점수
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// 표준 이상 점수 `2^(-E[h(x)] / c(ψ))` (0, 1]
    pub fn anomaly_score(&self, features: &FeatureVector) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, features, 0))
            .sum();
        let mean = total / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(1.0);
        2f64.powf(-mean / norm)
    }

    /// 정규화 전 점수. 0 이상이면 이상입니다.
    pub fn raw_score(&self, event: &Event) -> f64 {
        self.anomaly_score(&feature_vector(event)) - self.offset
    }
}

impl Detector for FittedIsolationForestDetector {
    fn name(&self) -> &str {
        IsolationForestDetector::NAME
    }

    fn evaluate(&self, event: &Arc<Event>) -> DetectionResult {
        let normalized = (self.raw_score(event) + 1.0) / 2.0;
        let description = if normalized >= 0.5 {
            "IsolationForest anomaly"
        } else {
            "IsolationForest benign"
        };
        DetectionResult::new(
            Arc::clone(event),
            normalized,
            description,
            IsolationForestDetector::NAME,
        )
    }
}

// ─── Tree ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn max_depth_for(sample_size: usize) -> usize {
    (sample_size.max(2) as f64).log2().ceil() as usize
}

fn build_tree(samples: &[FeatureVector], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || samples.len() <= 1 {
        return Node::Leaf {
            size: samples.len(),
        };
    }

    // 값이 모두 같은 특징으로는 분할할 수 없음
    let candidates: Vec<(usize, f64, f64)> = (0..FEATURE_COUNT)
        .filter_map(|feature| {
            let (min, max) = samples.iter().fold((f64::MAX, f64::MIN), |(lo, hi), x| {
                (lo.min(x[feature]), hi.max(x[feature]))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();
    if candidates.is_empty() {
        return Node::Leaf {
            size: samples.len(),
        };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<FeatureVector>, Vec<FeatureVector>) =
        samples.iter().partition(|x| x[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(&right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, features: &FeatureVector, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = if features[*feature] < *threshold {
                left
            } else {
                right
            };
            path_length(next, features, depth + 1)
        }
    }
}

/// 크기 n인 BST에서 실패한 탐색의 평균 경로 길이 c(n)
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// 선형 보간 분위수. `q`는 [0, 1].
fn percentile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    fn baseline() -> Vec<Event> {
        (1000..1020)
            .map(|port| {
                Event::new(Utc::now())
                    .with_source(Some("192.168.1.10".parse().unwrap()), Some(port))
                    .with_destination(Some("192.168.1.20".parse().unwrap()), Some(80))
                    .with_protocol("http")
            })
            .collect()
    }

    fn outlier() -> Event {
        Event::new(Utc::now())
            .with_source(Some("203.0.113.5".parse().unwrap()), Some(55555))
            .with_destination(Some("192.168.1.20".parse().unwrap()), Some(23))
            .with_protocol("tcp")
            .with_payload_field("message", Value::from("failed login"))
    }

    fn seeded() -> IsolationForestDetector {
        IsolationForestDetector::new(IsolationForestParams {
            seed: Some(42),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn feature_vector_layout() {
        let features = feature_vector(&outlier());
        assert_eq!(features, [55555.0, 23.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn feature_vector_defaults_missing_fields() {
        let features = feature_vector(&Event::new(Utc::now()).with_protocol("gre"));
        assert_eq!(features, [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn outlier_scores_as_anomaly() {
        let detector = seeded().fit(&baseline()).unwrap();
        let result = detector.evaluate(&Arc::new(outlier()));
        assert!(result.score >= 0.5, "score was {}", result.score);
        assert_eq!(result.description, "IsolationForest anomaly");
        assert_eq!(result.detector, "isolation-forest");
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let detector = seeded().fit(&baseline()).unwrap();
        for event in baseline().into_iter().chain(std::iter::once(outlier())) {
            let score = detector.evaluate(&Arc::new(event)).score;
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn same_seed_gives_same_scores() {
        let a = seeded().fit(&baseline()).unwrap();
        let b = seeded().fit(&baseline()).unwrap();
        let event = Arc::new(outlier());
        assert_eq!(a.evaluate(&event).score, b.evaluate(&event).score);
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let err = seeded().fit(&[]).unwrap_err();
        assert_eq!(err, DetectionError::EmptyTrainingSet);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let err = IsolationForestDetector::new(IsolationForestParams {
            contamination: 0.9,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { ref name, .. } if name == "contamination"));

        let err = IsolationForestDetector::new(IsolationForestParams {
            n_estimators: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { ref name, .. } if name == "n_estimators"));
    }

    #[test]
    fn single_training_event_does_not_panic() {
        let detector = seeded().fit(&baseline()[..1]).unwrap();
        let score = detector.evaluate(&Arc::new(outlier())).score;
        assert!(score.is_finite());
    }

    #[test]
    fn max_samples_caps_tree_sample() {
        let detector = IsolationForestDetector::new(IsolationForestParams {
            max_samples: 8,
            n_estimators: 10,
            seed: Some(7),
            ..Default::default()
        })
        .unwrap()
        .fit(&baseline())
        .unwrap();
        assert_eq!(detector.sample_size, 8);
        assert_eq!(detector.tree_count(), 10);
    }

    #[test]
    fn params_from_config() {
        let params = IsolationForestParams::from(&DetectorConfig::default());
        assert_eq!(params.n_estimators, 100);
        assert_eq!(params.seed, Some(42));
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn percentile_interpolates() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&mut values, 0.0), 1.0);
        assert_eq!(percentile(&mut values, 1.0), 4.0);
        assert!((percentile(&mut values, 0.5) - 2.5).abs() < 1e-12);
    }
}
