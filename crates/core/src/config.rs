//! 설정 관리 -- gotchi.toml 파싱 및 런타임 설정
//!
//! [`GotchiConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GOTCHI_MONITOR_TARGET_HOST=1.1.1.1` 형식)
//! 3. 설정 파일 (`gotchi.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gotchi_core::error::GotchiError> {
//! use gotchi_core::config::GotchiConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GotchiConfig::load("gotchi.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GotchiConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GotchiError};

/// Gotchi 통합 설정
///
/// `gotchi.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GotchiConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 네트워크 모니터(샘플러 + 변경 감시자) 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 분류기 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 위협 인텔리전스 설정
    #[serde(default)]
    pub threat_intel: ThreatIntelConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl GotchiConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GotchiError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GotchiError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GotchiError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GotchiError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GotchiError> {
        toml::from_str(toml_str).map_err(|e| {
            GotchiError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GOTCHI_{SECTION}_{FIELD}`
    /// 예: `GOTCHI_MONITOR_SAMPLE_INTERVAL_MS=1000`
    ///
    /// 호환을 위해 `ABUSEIPDB_API_KEY`, `ENABLE_GREYNOISE`도 읽습니다.
    /// 같은 값을 가리키는 `GOTCHI_*` 변수가 있으면 그쪽이 우선합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GOTCHI_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GOTCHI_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "GOTCHI_GENERAL_PID_FILE");

        // Monitor
        override_bool(&mut self.monitor.enabled, "GOTCHI_MONITOR_ENABLED");
        override_u64(
            &mut self.monitor.sample_interval_ms,
            "GOTCHI_MONITOR_SAMPLE_INTERVAL_MS",
        );
        override_u64(
            &mut self.monitor.watch_interval_secs,
            "GOTCHI_MONITOR_WATCH_INTERVAL_SECS",
        );
        override_optional_string(&mut self.monitor.target_host, "GOTCHI_MONITOR_TARGET_HOST");
        override_bool(
            &mut self.monitor.trust_gateway,
            "GOTCHI_MONITOR_TRUST_GATEWAY",
        );
        override_u32(
            &mut self.monitor.loss_attempts,
            "GOTCHI_MONITOR_LOSS_ATTEMPTS",
        );
        override_u32(
            &mut self.monitor.loss_every_n_cycles,
            "GOTCHI_MONITOR_LOSS_EVERY_N_CYCLES",
        );
        override_ports(
            &mut self.monitor.latency_ports,
            "GOTCHI_MONITOR_LATENCY_PORTS",
        );
        override_ports(&mut self.monitor.loss_ports, "GOTCHI_MONITOR_LOSS_PORTS");

        // Classifier
        override_string(
            &mut self.classifier.metric_source,
            "GOTCHI_CLASSIFIER_METRIC_SOURCE",
        );
        override_u64(
            &mut self.classifier.interval_secs,
            "GOTCHI_CLASSIFIER_INTERVAL_SECS",
        );

        // Threat intel (legacy names first so GOTCHI_* wins)
        override_optional_string(&mut self.threat_intel.abuseipdb_api_key, "ABUSEIPDB_API_KEY");
        if let Ok(val) = std::env::var("ENABLE_GREYNOISE") {
            self.threat_intel.greynoise_enabled =
                matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        override_bool(&mut self.threat_intel.enabled, "GOTCHI_THREAT_INTEL_ENABLED");
        override_bool(
            &mut self.threat_intel.greynoise_enabled,
            "GOTCHI_THREAT_INTEL_GREYNOISE_ENABLED",
        );
        override_optional_string(
            &mut self.threat_intel.abuseipdb_api_key,
            "GOTCHI_THREAT_INTEL_ABUSEIPDB_API_KEY",
        );
        override_u64(
            &mut self.threat_intel.cache_ttl_secs,
            "GOTCHI_THREAT_INTEL_CACHE_TTL_SECS",
        );
        override_usize(
            &mut self.threat_intel.cache_max_entries,
            "GOTCHI_THREAT_INTEL_CACHE_MAX_ENTRIES",
        );
        override_usize(
            &mut self.threat_intel.max_new_checks_per_scan,
            "GOTCHI_THREAT_INTEL_MAX_NEW_CHECKS_PER_SCAN",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "GOTCHI_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "GOTCHI_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "GOTCHI_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 모듈별 세부 범위 검증은 각 크레이트의 `XConfig::validate()`가 담당하고,
    /// 여기서는 여러 모듈이 공유하는 값과 열거형 문자열을 검사합니다.
    pub fn validate(&self) -> Result<(), GotchiError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.monitor.sample_interval_ms == 0 {
            return Err(invalid("monitor.sample_interval_ms", "must be greater than 0"));
        }

        if self.monitor.watch_interval_secs == 0 {
            return Err(invalid("monitor.watch_interval_secs", "must be greater than 0"));
        }

        if self.monitor.latency_ports.is_empty() {
            return Err(invalid("monitor.latency_ports", "must not be empty"));
        }

        if self.monitor.loss_ports.is_empty() {
            return Err(invalid("monitor.loss_ports", "must not be empty"));
        }

        if self.monitor.loss_attempts == 0 {
            return Err(invalid("monitor.loss_attempts", "must be greater than 0"));
        }

        let valid_sources = ["instant", "window_average"];
        if !valid_sources.contains(&self.classifier.metric_source.as_str()) {
            return Err(invalid(
                "classifier.metric_source",
                format!("must be one of: {}", valid_sources.join(", ")),
            ));
        }

        self.classifier.bands.validate()?;

        if self.threat_intel.cache_evict_batch == 0
            || self.threat_intel.cache_evict_batch > self.threat_intel.cache_max_entries
        {
            return Err(invalid(
                "threat_intel.cache_evict_batch",
                "must be 1..=cache_max_entries",
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0 when metrics are enabled"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> GotchiError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 네트워크 모니터 설정
///
/// 샘플러와 변경 감시자가 함께 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 샘플링 주기 (밀리초)
    pub sample_interval_ms: u64,
    /// 네트워크 변경 감시 주기 (초)
    pub watch_interval_secs: u64,
    /// 프로브 대상 호스트 (없으면 기본 게이트웨이)
    pub target_host: Option<String>,
    /// 프로브가 모두 실패해도 게이트웨이가 있으면 연결된 것으로 간주
    pub trust_gateway: bool,
    /// 지연 측정 포트 (순서대로 시도)
    pub latency_ports: Vec<u16>,
    /// 지연 측정 포트별 타임아웃 (밀리초)
    pub latency_timeout_ms: u64,
    /// 손실 측정 포트 (시도 순번으로 순환)
    pub loss_ports: Vec<u16>,
    /// 손실 측정 시도 횟수
    pub loss_attempts: u32,
    /// 손실 측정 시도별 타임아웃 (밀리초)
    pub loss_timeout_ms: u64,
    /// 손실 측정 시도 간 대기 (밀리초)
    pub loss_delay_ms: u64,
    /// 손실 측정 주기 (N 사이클마다 1회)
    pub loss_every_n_cycles: u32,
    /// 연결 확인 포트
    pub connectivity_ports: Vec<u16>,
    /// 연결 확인 타임아웃 (밀리초)
    pub connectivity_timeout_ms: u64,
    /// 최근 윈도우 히스토리 크기
    pub history_size: usize,
    /// 기준선 풀 크기
    pub baseline_size: usize,
    /// 정지 시 워커 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: 2_000,
            watch_interval_secs: 5,
            target_host: None,
            trust_gateway: true,
            latency_ports: vec![80, 443, 22, 53, 8080],
            latency_timeout_ms: 500,
            loss_ports: vec![80, 443, 22, 53, 8080, 21, 25, 3306],
            loss_attempts: 10,
            loss_timeout_ms: 200,
            loss_delay_ms: 20,
            loss_every_n_cycles: 5,
            connectivity_ports: vec![80, 443, 22],
            connectivity_timeout_ms: 200,
            history_size: 60,
            baseline_size: 100,
            shutdown_timeout_secs: 5,
        }
    }
}

/// 분류기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 분류 입력값 (instant = 최근 측정값, window_average = 윈도우 평균)
    pub metric_source: String,
    /// daemon 분석 루프 주기 (초)
    pub interval_secs: u64,
    /// 이상 점수 히스토리 크기
    pub score_history_size: usize,
    /// 공격 히스토리 크기
    pub attack_history_size: usize,
    /// 상태 밴드 임계값
    pub bands: BandsConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            metric_source: "instant".to_owned(),
            interval_secs: 2,
            score_history_size: 50,
            attack_history_size: 100,
            bands: BandsConfig::default(),
        }
    }
}

/// 밴드 상한값
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLimit {
    /// 지연 상한 (ms, 미만일 때 해당)
    pub max_latency_ms: f64,
    /// 손실률 상한 (%, 미만일 때 해당)
    pub max_packet_loss_pct: f64,
}

impl BandLimit {
    /// 새 밴드 상한값을 생성합니다.
    pub const fn new(max_latency_ms: f64, max_packet_loss_pct: f64) -> Self {
        Self {
            max_latency_ms,
            max_packet_loss_pct,
        }
    }
}

/// 상태 밴드 설정
///
/// happy → alert → under_attack 순서로 검사되며, 어디에도 속하지 않으면 stressed입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    /// 정상 밴드
    pub happy: BandLimit,
    /// 경계 밴드
    pub alert: BandLimit,
    /// 공격 밴드
    pub under_attack: BandLimit,
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            happy: BandLimit::new(10.0, 1.0),
            alert: BandLimit::new(50.0, 5.0),
            under_attack: BandLimit::new(200.0, 20.0),
        }
    }
}

impl BandsConfig {
    /// 밴드 상한값이 두 축 모두 단조 증가하는지 검증합니다.
    ///
    /// 단조성이 깨지면 값이 커질 때 상태가 더 좋은 밴드로 돌아갈 수 있습니다.
    pub fn validate(&self) -> Result<(), GotchiError> {
        let ordered = [
            ("happy", self.happy),
            ("alert", self.alert),
            ("under_attack", self.under_attack),
        ];

        for (name, band) in &ordered {
            let positive = |v: f64| v.is_finite() && v > 0.0;
            if !positive(band.max_latency_ms) || !positive(band.max_packet_loss_pct) {
                return Err(invalid(
                    &format!("classifier.bands.{name}"),
                    "limits must be positive",
                ));
            }
        }

        for pair in ordered.windows(2) {
            let (prev_name, prev) = pair[0];
            let (name, band) = pair[1];
            if band.max_latency_ms < prev.max_latency_ms
                || band.max_packet_loss_pct < prev.max_packet_loss_pct
            {
                return Err(invalid(
                    &format!("classifier.bands.{name}"),
                    format!("limits must not be lower than '{prev_name}'"),
                ));
            }
        }

        Ok(())
    }
}

/// 위협 인텔리전스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatIntelConfig {
    /// 활성화 여부 (연결 스캔 + 평판 조회)
    pub enabled: bool,
    /// GreyNoise community API 사용 여부
    pub greynoise_enabled: bool,
    /// GreyNoise API 기본 URL
    pub greynoise_base_url: String,
    /// AbuseIPDB API 키 (없으면 비활성)
    pub abuseipdb_api_key: Option<String>,
    /// AbuseIPDB API 기본 URL
    pub abuseipdb_base_url: String,
    /// 캐시 TTL (초)
    pub cache_ttl_secs: u64,
    /// 캐시 최대 엔트리 수
    pub cache_max_entries: usize,
    /// 용량 초과 시 한 번에 제거할 엔트리 수
    pub cache_evict_batch: usize,
    /// 연결 스캔 주기 (초)
    pub scan_interval_secs: u64,
    /// 스캔당 새로 조회할 최대 IP 수
    pub max_new_checks_per_scan: usize,
    /// IP당 연결 수 임계값
    pub per_ip_threshold: usize,
    /// 전체 연결 수 임계값
    pub total_threshold: usize,
}

impl Default for ThreatIntelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            greynoise_enabled: false,
            greynoise_base_url: "https://api.greynoise.io".to_owned(),
            abuseipdb_api_key: None,
            abuseipdb_base_url: "https://api.abuseipdb.com".to_owned(),
            cache_ttl_secs: 3600,
            cache_max_entries: 500,
            cache_evict_batch: 100,
            scan_interval_secs: 1,
            max_new_checks_per_scan: 1,
            per_ip_threshold: 50,
            total_threshold: 100,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// scrape 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_optional_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let trimmed = val.trim();
        *target = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_ports(target: &mut Vec<u16>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<u16>, _> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<u16>)
            .collect();
        match parsed {
            Ok(ports) if !ports.is_empty() => *target = ports,
            _ => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse port list from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = GotchiConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.monitor.enabled);
        assert_eq!(config.monitor.sample_interval_ms, 2_000);
        assert_eq!(config.monitor.watch_interval_secs, 5);
        assert_eq!(config.monitor.latency_ports, vec![80, 443, 22, 53, 8080]);
        assert_eq!(config.classifier.metric_source, "instant");
        assert!(!config.threat_intel.enabled);
        assert_eq!(config.threat_intel.cache_ttl_secs, 3600);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        GotchiConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = GotchiConfig::parse("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.monitor.history_size, 60);
        assert_eq!(config.monitor.baseline_size, 100);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml_str = r#"
[monitor]
target_host = "1.1.1.1"
loss_attempts = 4

[classifier.bands]
happy = { max_latency_ms = 15.0, max_packet_loss_pct = 2.0 }
"#;
        let config = GotchiConfig::parse(toml_str).unwrap();
        assert_eq!(config.monitor.target_host.as_deref(), Some("1.1.1.1"));
        assert_eq!(config.monitor.loss_attempts, 4);
        assert_eq!(config.monitor.loss_timeout_ms, 200);
        assert_eq!(config.classifier.bands.happy, BandLimit::new(15.0, 2.0));
        assert_eq!(config.classifier.bands.alert, BandLimit::new(50.0, 5.0));
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = GotchiConfig::parse("[monitor\nenabled = ").unwrap_err();
        assert!(matches!(
            err,
            GotchiError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = GotchiConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_unknown_metric_source() {
        let mut config = GotchiConfig::default();
        config.classifier.metric_source = "peak".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("classifier.metric_source"));
    }

    #[test]
    fn validate_rejects_misordered_bands() {
        let mut config = GotchiConfig::default();
        config.classifier.bands.alert = BandLimit::new(5.0, 5.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("classifier.bands.alert"));
    }

    #[test]
    fn validate_rejects_non_positive_band() {
        let mut config = GotchiConfig::default();
        config.classifier.bands.happy = BandLimit::new(0.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_ports() {
        let mut config = GotchiConfig::default();
        config.monitor.latency_ports.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_evict_batch_larger_than_cache() {
        let mut config = GotchiConfig::default();
        config.threat_intel.cache_evict_batch = 1_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache_evict_batch"));
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_GOTCHI_STR", "overridden") };
        override_string(&mut val, "TEST_GOTCHI_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_GOTCHI_STR") };
    }

    #[test]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: 테스트는 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_GOTCHI_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_GOTCHI_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_GOTCHI_BOOL_BAD") };
    }

    #[test]
    fn env_override_optional_string_empty_clears() {
        let mut val = Some("key".to_owned());
        // SAFETY: 테스트는 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_GOTCHI_OPT_EMPTY", "  ") };
        override_optional_string(&mut val, "TEST_GOTCHI_OPT_EMPTY");
        assert!(val.is_none());
        unsafe { std::env::remove_var("TEST_GOTCHI_OPT_EMPTY") };
    }

    #[test]
    fn env_override_ports() {
        let mut val = vec![80];
        // SAFETY: 테스트는 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_GOTCHI_PORTS", "443, 8443") };
        override_ports(&mut val, "TEST_GOTCHI_PORTS");
        assert_eq!(val, vec![443, 8443]);
        unsafe { std::env::remove_var("TEST_GOTCHI_PORTS") };
    }

    #[test]
    fn env_override_ports_invalid_keeps_original() {
        let mut val = vec![80];
        // SAFETY: 테스트는 고유한 키를 사용하므로 다른 테스트와 충돌하지 않습니다.
        unsafe { std::env::set_var("TEST_GOTCHI_PORTS_BAD", "80,http") };
        override_ports(&mut val, "TEST_GOTCHI_PORTS_BAD");
        assert_eq!(val, vec![80]);
        unsafe { std::env::remove_var("TEST_GOTCHI_PORTS_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 7u64;
        override_u64(&mut val, "TEST_GOTCHI_NONEXISTENT_12345");
        assert_eq!(val, 7);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = GotchiConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = GotchiConfig::parse(&toml_str).unwrap();
        assert_eq!(config.monitor.loss_ports, parsed.monitor.loss_ports);
        assert_eq!(config.classifier.bands, parsed.classifier.bands);
        assert_eq!(config.metrics.port, parsed.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = GotchiConfig::from_file("/nonexistent/path/gotchi.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GotchiError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
