//! 에러 타입 -- 도메인별 에러 정의

/// Netsentry 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NetsentryError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 원시 이벤트 정규화 에러
    #[error("normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    /// 탐지기 에러
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// 큐 전송 에러 (재시도 소진)
    #[error("queue error: {0}")]
    Queue(#[from] QueueSendError),

    /// 알림 채널 에러
    #[error("alert error: {0}")]
    Alert(#[from] AlertError),

    /// 외부 조회(GeoIP/ASN) 에러
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// 전송 계층 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 파이프라인 조립/실행 에러
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 원시 이벤트 정규화 에러
///
/// 정규화는 부분 결과를 반환하지 않습니다. 이 에러가 반환되면
/// 해당 원시 이벤트는 거부된 것으로 취급합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    /// 타임스탬프 별칭 키가 하나도 값을 주지 않음
    #[error("missing timestamp")]
    MissingTimestamp,

    /// 타임스탬프 값을 해석할 수 없음
    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: String, value: String },

    /// IP 주소 형식이 아님
    #[error("invalid ip address in '{field}': {value}")]
    InvalidAddress { field: String, value: String },

    /// 정수로 변환할 수 없는 포트 값
    #[error("invalid integer in '{field}': {value}")]
    InvalidNumber { field: String, value: String },

    /// strict 모드에서 출발지/목적지 주소가 모두 없음
    #[error("event has neither source nor destination address")]
    MissingAddress,

    /// 최상위 값이 JSON 객체가 아님
    #[error("raw event must be a JSON object")]
    NotAnObject,
}

/// 탐지기 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    /// 학습 데이터가 비어 있음
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    /// 잘못된 하이퍼파라미터
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// 전송 계층 에러 -- 큐 백엔드 클라이언트가 반환하는 원인
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 전송 실패
    #[error("send failed: {0}")]
    Send(String),

    /// 직렬화 실패
    #[error("encode failed: {0}")]
    Encode(String),

    /// 이미 닫힌 클라이언트
    #[error("client closed")]
    Closed,
}

impl TransportError {
    /// 다시 시도하면 성공할 수 있는 에러인지 여부
    ///
    /// 직렬화 실패와 닫힌 클라이언트는 재시도해도 결과가 같습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Send(_))
    }
}

/// 큐 배치 전송 실패 -- 재시도 횟수를 모두 소진함
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{backend} send failed after {attempts} attempt(s): {source}")]
pub struct QueueSendError {
    /// 백엔드 이름 (memory, redis, kafka)
    pub backend: String,
    /// 시도 횟수
    pub attempts: u32,
    /// 마지막 시도의 원인
    #[source]
    pub source: TransportError,
}

/// 알림 채널 에러
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// 메시지 구성 실패 (주소 형식 등)
    #[error("{channel}: invalid message: {reason}")]
    InvalidMessage { channel: String, reason: String },

    /// 전송 실패
    #[error("{channel}: delivery failed: {reason}")]
    Delivery { channel: String, reason: String },
}

/// 외부 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// 데이터베이스 열기 실패
    #[error("failed to open database '{path}': {reason}")]
    Open { path: String, reason: String },

    /// 조회 실패
    #[error("lookup failed for {ip}: {reason}")]
    Query { ip: String, reason: String },
}
