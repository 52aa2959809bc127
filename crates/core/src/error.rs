//! 에러 타입 -- 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 타입을 두고 `From<XError> for GotchiError` 변환을 구현하여
//! 상위 레이어(daemon)에서 `?` 연산자로 전파할 수 있도록 합니다.

/// Gotchi 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum GotchiError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 네트워크 모니터링 에러
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// 위협 인텔리전스 에러
    #[error("threat intel error: {0}")]
    Intel(#[from] IntelError),

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

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 통신 실패
    #[error("channel error: {0}")]
    Channel(String),
}

/// 네트워크 모니터링 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 인터페이스/게이트웨이 탐색 실패
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// 연결 프로브 실패
    #[error("probe failed: {0}")]
    Probe(String),
}

/// 위협 인텔리전스 에러
#[derive(Debug, thiserror::Error)]
pub enum IntelError {
    /// 평판 소스 조회 실패
    #[error("source '{source_name}' failed: {reason}")]
    Source { source_name: String, reason: String },

    /// 조회 시간 초과
    #[error("source '{source_name}' timed out")]
    Timeout { source_name: String },
}
