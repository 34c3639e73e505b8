//! 도메인 타입 -- 알림과 이상 레코드
//!
//! 오케스트레이터가 [`DetectionResult`](crate::event::DetectionResult)에서
//! [`Alert`]와 [`AnomalyRecord`]를 만들어 채널과 저장소에 넘깁니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{DetectionResult, Event, display_ip};

/// 알림 심각도
///
/// `Ord` 구현으로 비교가 가능합니다 (`Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 0.6 미만
    #[default]
    Medium,
    /// 0.6 이상 0.85 미만
    High,
    /// 0.85 이상
    Critical,
}

impl Severity {
    /// 점수에서 심각도를 결정합니다.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 알림
///
/// 오케스트레이터만 생성하며 저장하지 않습니다.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// 알림 ID (UUID v4)
    pub id: String,
    /// 제목
    pub title: String,
    /// 심각도
    pub severity: Severity,
    /// 관련 이벤트
    pub event: Arc<Event>,
    /// 부가 정보 (score, description, source_ip, destination_ip)
    pub metadata: BTreeMap<String, String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// 탐지 결과에서 알림을 생성합니다.
    pub fn from_detection(result: &DetectionResult) -> Self {
        let event = &result.event;
        let mut metadata = BTreeMap::new();
        metadata.insert("score".to_owned(), format!("{:.2}", result.score));
        metadata.insert("description".to_owned(), result.description.clone());
        metadata.insert("source_ip".to_owned(), display_ip(event.source_ip));
        metadata.insert("destination_ip".to_owned(), display_ip(event.destination_ip));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: format!("Anomaly detected by {}", result.detector),
            severity: Severity::from_score(result.score),
            event: Arc::clone(event),
            metadata,
            created_at: Utc::now(),
        }
    }

    /// 채널 메시지의 제목 줄: `[HIGH] title`
    pub fn subject(&self) -> String {
        format!("[{}] {}", self.severity.as_str().to_uppercase(), self.title)
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.title, self.id)
    }
}

/// 저장된 이상 레코드
///
/// 저장소의 `add`로만 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRecord {
    /// 1부터 증가하는 ID
    pub id: u64,
    /// 저장 시각 (UTC)
    pub detected_at: DateTime<Utc>,
    /// 이상 점수
    pub score: f64,
    /// 설명
    pub description: String,
    /// 이벤트 스냅샷
    pub event: Event,
}

impl fmt::Display for AnomalyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} score={:.2} {} ({})",
            self.id, self.score, self.description, self.event
        )
    }
}
