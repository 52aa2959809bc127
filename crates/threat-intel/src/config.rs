//! 위협 인텔리전스 설정
//!
//! [`IntelConfig`]는 core의 `[threat_intel]` 섹션에서 파생됩니다.
//! 연결 급증 임계값은 `gotchi-detector`의 `SurveyConfig`가 가져갑니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gotchi_core::config::ThreatIntelConfig;

use crate::error::ThreatIntelError;

/// 설정 상한값 상수
const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 3600;
const MAX_CACHE_ENTRIES: usize = 1_000_000;
const MAX_SCAN_INTERVAL_SECS: u64 = 3600;
const MAX_NEW_CHECKS_PER_SCAN: usize = 100;

/// 위협 인텔리전스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// GreyNoise 커뮤니티 API 사용 여부
    pub greynoise_enabled: bool,
    /// GreyNoise API 기본 URL
    pub greynoise_base_url: String,
    /// AbuseIPDB API 키
    pub abuseipdb_api_key: Option<String>,
    /// AbuseIPDB API 기본 URL
    pub abuseipdb_base_url: String,
    /// 캐시 TTL (초)
    pub cache_ttl_secs: u64,
    /// 캐시 최대 엔트리 수
    pub cache_max_entries: usize,
    /// 용량 초과 시 제거할 엔트리 수
    pub cache_evict_batch: usize,
    /// 연결 스캔 주기 (초)
    pub scan_interval_secs: u64,
    /// 스캔당 새로 조회할 최대 IP 수
    pub max_new_checks_per_scan: usize,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self::from_core(&ThreatIntelConfig::default())
    }
}

impl IntelConfig {
    /// core의 `ThreatIntelConfig`에서 설정을 생성합니다.
    pub fn from_core(core: &ThreatIntelConfig) -> Self {
        Self {
            enabled: core.enabled,
            greynoise_enabled: core.greynoise_enabled,
            greynoise_base_url: core.greynoise_base_url.clone(),
            abuseipdb_api_key: core.abuseipdb_api_key.clone(),
            abuseipdb_base_url: core.abuseipdb_base_url.clone(),
            cache_ttl_secs: core.cache_ttl_secs,
            cache_max_entries: core.cache_max_entries,
            cache_evict_batch: core.cache_evict_batch,
            scan_interval_secs: core.scan_interval_secs,
            max_new_checks_per_scan: core.max_new_checks_per_scan,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ThreatIntelError> {
        check_range("cache_ttl_secs", self.cache_ttl_secs, MAX_CACHE_TTL_SECS)?;
        check_range(
            "cache_max_entries",
            self.cache_max_entries as u64,
            MAX_CACHE_ENTRIES as u64,
        )?;
        check_range(
            "cache_evict_batch",
            self.cache_evict_batch as u64,
            self.cache_max_entries as u64,
        )?;
        check_range(
            "scan_interval_secs",
            self.scan_interval_secs,
            MAX_SCAN_INTERVAL_SECS,
        )?;
        check_range(
            "max_new_checks_per_scan",
            self.max_new_checks_per_scan as u64,
            MAX_NEW_CHECKS_PER_SCAN as u64,
        )?;
        check_url("greynoise_base_url", &self.greynoise_base_url)?;
        check_url("abuseipdb_base_url", &self.abuseipdb_base_url)?;
        Ok(())
    }

    /// AbuseIPDB 키가 설정되어 있으면 키를 반환합니다. 빈 문자열은 미설정으로 취급합니다.
    pub fn abuseipdb_key(&self) -> Option<&str> {
        self.abuseipdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// 활성 소스가 하나라도 있는지 확인합니다.
    pub fn has_sources(&self) -> bool {
        self.greynoise_enabled || self.abuseipdb_key().is_some()
    }

    /// 캐시 TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// 연결 스캔 주기
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

fn check_range(field: &str, value: u64, max: u64) -> Result<(), ThreatIntelError> {
    if value == 0 || value > max {
        return Err(ThreatIntelError::Config {
            field: field.to_owned(),
            reason: format!("must be 1-{max}"),
        });
    }
    Ok(())
}

fn check_url(field: &str, url: &str) -> Result<(), ThreatIntelError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ThreatIntelError::Config {
            field: field.to_owned(),
            reason: format!("'{url}' is not an http(s) URL"),
        });
    }
    Ok(())
}
