//! 탐지기 에러 타입

use gotchi_core::error::{ConfigError, GotchiError};

/// 탐지기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<DetectorError> for GotchiError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Config { field, reason } => {
                GotchiError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_invalid_value() {
        let err: GotchiError = DetectorError::Config {
            field: "metric_source".to_owned(),
            reason: "unknown".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("metric_source"));
    }
}
