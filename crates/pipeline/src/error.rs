//! 파이프라인 조립/실행 에러 타입
//!
//! [`PipelineError`]는 파이프라인을 조립하거나 수집기를 실행할 때 발생하는 에러를
//! 표현합니다. `From<PipelineError> for NetsentryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 이벤트 단위 에러(`NormalizationError`)는 여기에 포함하지 않습니다.
//! 거부된 이벤트는 호출자가 건너뛰고 집계합니다.

use netsentry_core::error::{
    ConfigError, DetectionError, LookupError, NetsentryError, QueueSendError,
};

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 수집기 에러 (파일 형식 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (json_file 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 탐지기 조립 실패
    #[error("detector error: {0}")]
    Detection(#[from] DetectionError),

    /// 조회 데이터베이스 열기 실패
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// 큐 전송 실패
    #[error("queue error: {0}")]
    Queue(#[from] QueueSendError),

    /// JSON 파싱 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for NetsentryError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Config { field, reason } => {
                NetsentryError::Config(ConfigError::InvalidValue { field, reason })
            }
            PipelineError::Detection(e) => NetsentryError::Detection(e),
            PipelineError::Lookup(e) => NetsentryError::Lookup(e),
            PipelineError::Queue(e) => NetsentryError::Queue(e),
            PipelineError::Io(e) => NetsentryError::Io(e),
            other => NetsentryError::Pipeline(other.to_string()),
        }
    }
}
