//! 네트워크 모니터 에러 타입
//!
//! [`NetmonError`]는 탐색, 프로브, 연결 목록 수집, 설정 검증에서 발생하는 에러를 표현합니다.
//! 샘플러와 감시자는 이 에러를 호출자에게 올리지 않고 degraded 값으로 흡수합니다.
//! `From<NetmonError> for GotchiError` 변환으로 daemon에서는 `?`로 전파할 수 있습니다.

use gotchi_core::error::{ConfigError, GotchiError, MonitorError};

/// 네트워크 모니터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NetmonError {
    /// 게이트웨이/인터페이스/SSID 탐색 실패
    #[error("discovery error: {0}")]
    Discovery(String),

    /// 연결 프로브 실패
    #[error("probe error: {0}")]
    Probe(String),

    /// 연결 목록 수집 실패
    #[error("connection listing failed: {path}: {reason}")]
    ConnectionList {
        /// 읽으려던 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<NetmonError> for GotchiError {
    fn from(err: NetmonError) -> Self {
        match err {
            NetmonError::Discovery(msg) => GotchiError::Monitor(MonitorError::Discovery(msg)),
            NetmonError::Probe(msg) => GotchiError::Monitor(MonitorError::Probe(msg)),
            NetmonError::ConnectionList { path, reason } => {
                GotchiError::Monitor(MonitorError::Discovery(format!("{path}: {reason}")))
            }
            NetmonError::Config { field, reason } => {
                GotchiError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
