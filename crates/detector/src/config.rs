//! 탐지기 설정
//!
//! [`DetectorConfig`]는 core의 `[classifier]` 섹션에서,
//! [`SurveyConfig`]는 `[threat_intel]` 섹션의 연결 임계값에서 파생됩니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use gotchi_core::config::{BandsConfig, ClassifierConfig, ThreatIntelConfig};

use crate::error::DetectorError;

/// 설정 상한값 상수
const MAX_HISTORY_SIZE: usize = 10_000;
const MAX_CONNECTION_THRESHOLD: usize = 1_000_000;

/// 연결 수가 이 값을 넘으면 경고 수준
const DEFAULT_WARNING_THRESHOLD: usize = 20;

/// 분류기 입력값 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    /// 최근 측정값
    #[default]
    Instant,
    /// 최근 윈도우 평균
    WindowAverage,
}

impl FromStr for MetricSource {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instant" => Ok(Self::Instant),
            "window_average" => Ok(Self::WindowAverage),
            other => Err(DetectorError::Config {
                field: "metric_source".to_owned(),
                reason: format!("unknown metric source '{other}' (expected instant or window_average)"),
            }),
        }
    }
}

impl fmt::Display for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => write!(f, "instant"),
            Self::WindowAverage => write!(f, "window_average"),
        }
    }
}

/// 분류기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 분류 입력값
    pub metric_source: MetricSource,
    /// 이상 점수 히스토리 크기
    pub score_history_size: usize,
    /// 공격 히스토리 크기
    pub attack_history_size: usize,
    /// 상태 밴드 임계값
    pub bands: BandsConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            metric_source: MetricSource::Instant,
            score_history_size: 50,
            attack_history_size: 100,
            bands: BandsConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// core의 `ClassifierConfig`에서 분류기 설정을 생성합니다.
    pub fn from_core(core: &ClassifierConfig) -> Result<Self, DetectorError> {
        Ok(Self {
            metric_source: core.metric_source.parse()?,
            score_history_size: core.score_history_size,
            attack_history_size: core.attack_history_size,
            bands: core.bands.clone(),
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DetectorError> {
        check_range("score_history_size", self.score_history_size, MAX_HISTORY_SIZE)?;
        check_range("attack_history_size", self.attack_history_size, MAX_HISTORY_SIZE)?;
        Ok(())
    }
}

/// 연결 급증 판정 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// 단일 IP 연결 수 임계값 (이상이면 급증)
    pub per_ip_threshold: usize,
    /// 전체 연결 수 임계값 (이상이면 급증)
    pub total_threshold: usize,
    /// 경고 수준 연결 수 (초과하면 경고)
    pub warning_threshold: usize,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            per_ip_threshold: 50,
            total_threshold: 100,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }
}

impl SurveyConfig {
    /// core의 `ThreatIntelConfig`에서 판정 설정을 생성합니다.
    pub fn from_core(core: &ThreatIntelConfig) -> Self {
        Self {
            per_ip_threshold: core.per_ip_threshold,
            total_threshold: core.total_threshold,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DetectorError> {
        check_range("per_ip_threshold", self.per_ip_threshold, MAX_CONNECTION_THRESHOLD)?;
        check_range("total_threshold", self.total_threshold, MAX_CONNECTION_THRESHOLD)?;
        Ok(())
    }
}

fn check_range(field: &str, value: usize, max: usize) -> Result<(), DetectorError> {
    if value == 0 || value > max {
        return Err(DetectorError::Config {
            field: field.to_owned(),
            reason: format!("must be 1-{max}"),
        });
    }
    Ok(())
}
