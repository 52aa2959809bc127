//! 위협 인텔리전스 에러 타입
//!
//! 소스 조회 실패는 [`ReputationAggregator`](crate::ReputationAggregator)가
//! `"{source}: {error}"` 문자열로 흡수하므로, 호출자까지 전파되는 것은 설정 에러뿐입니다.

use std::time::Duration;

use gotchi_core::error::{ConfigError, GotchiError, IntelError};

/// 위협 인텔리전스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ThreatIntelError {
    /// 요청 전송 실패 (DNS, 연결, TLS 등)
    #[error("request failed: {0}")]
    Http(String),

    /// 예상하지 못한 HTTP 상태 코드
    #[error("HTTP {0}")]
    Status(u16),

    /// 응답 본문 해석 실패
    #[error("invalid response: {0}")]
    Decode(String),

    /// 조회 시간 초과
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<reqwest::Error> for ThreatIntelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Http(format!("timeout: {err}"));
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Http(err.to_string())
    }
}

impl From<ThreatIntelError> for GotchiError {
    fn from(err: ThreatIntelError) -> Self {
        match err {
            ThreatIntelError::Config { field, reason } => {
                GotchiError::Config(ConfigError::InvalidValue { field, reason })
            }
            ThreatIntelError::Timeout(_) => GotchiError::Intel(IntelError::Timeout {
                source_name: "threat_intel".to_owned(),
            }),
            other => GotchiError::Intel(IntelError::Source {
                source_name: "threat_intel".to_owned(),
                reason: other.to_string(),
            }),
        }
    }
}
