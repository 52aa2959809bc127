//! 네트워크 모니터 설정
//!
//! [`SamplerConfig`]와 [`WatcherConfig`]는 core의
//! [`MonitorConfig`](gotchi_core::config::MonitorConfig)에서 파생됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use gotchi_core::config::GotchiConfig;
//! use gotchi_netmon::config::SamplerConfig;
//!
//! let core_config = GotchiConfig::default();
//! let config = SamplerConfig::from_core(&core_config.monitor);
//! config.validate()?;
//! ```

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gotchi_core::config::MonitorConfig;

use crate::error::NetmonError;
use crate::probe::ProbePlan;

/// 설정 상한값 상수
const MAX_SAMPLE_INTERVAL_MS: u64 = 60_000;
const MAX_WATCH_INTERVAL_SECS: u64 = 3600;
const MAX_PROBE_TIMEOUT_MS: u64 = 10_000;
const MAX_LOSS_ATTEMPTS: u32 = 100;
const MAX_LOSS_DELAY_MS: u64 = 1_000;
const MAX_LOSS_EVERY_N_CYCLES: u32 = 1_000;
const MAX_HISTORY_SIZE: usize = 10_000;
const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 60;

/// 샘플러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// 샘플링 주기 (밀리초)
    pub sample_interval_ms: u64,
    /// 프로브 대상 IP (없으면 기본 게이트웨이)
    pub target_host: Option<String>,
    /// 프로브가 모두 실패해도 게이트웨이가 있으면 도달 가능으로 간주
    pub trust_gateway: bool,
    /// 지연 측정 포트
    pub latency_ports: Vec<u16>,
    /// 지연 측정 포트별 타임아웃 (밀리초)
    pub latency_timeout_ms: u64,
    /// 손실 측정 포트
    pub loss_ports: Vec<u16>,
    /// 손실 측정 시도 횟수
    pub loss_attempts: u32,
    /// 손실 측정 시도별 타임아웃 (밀리초)
    pub loss_timeout_ms: u64,
    /// 손실 측정 시도 간 대기 (밀리초)
    pub loss_delay_ms: u64,
    /// N 사이클마다 손실 측정
    pub loss_every_n_cycles: u32,
    /// 연결 확인 포트
    pub connectivity_ports: Vec<u16>,
    /// 연결 확인 타임아웃 (밀리초)
    pub connectivity_timeout_ms: u64,
    /// 최근 윈도우 크기
    pub history_size: usize,
    /// 기준선 풀 크기
    pub baseline_size: usize,
    /// 정지 시 워커 종료 대기 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from_core(&MonitorConfig::default())
    }
}

impl SamplerConfig {
    /// core의 `MonitorConfig`에서 샘플러 설정을 생성합니다.
    pub fn from_core(core: &MonitorConfig) -> Self {
        Self {
            sample_interval_ms: core.sample_interval_ms,
            target_host: core.target_host.clone(),
            trust_gateway: core.trust_gateway,
            latency_ports: core.latency_ports.clone(),
            latency_timeout_ms: core.latency_timeout_ms,
            loss_ports: core.loss_ports.clone(),
            loss_attempts: core.loss_attempts,
            loss_timeout_ms: core.loss_timeout_ms,
            loss_delay_ms: core.loss_delay_ms,
            loss_every_n_cycles: core.loss_every_n_cycles,
            connectivity_ports: core.connectivity_ports.clone(),
            connectivity_timeout_ms: core.connectivity_timeout_ms,
            history_size: core.history_size,
            baseline_size: core.baseline_size,
            shutdown_timeout_secs: core.shutdown_timeout_secs,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetmonError> {
        if self.sample_interval_ms == 0 || self.sample_interval_ms > MAX_SAMPLE_INTERVAL_MS {
            return Err(config_err(
                "sample_interval_ms",
                format!("must be 1-{MAX_SAMPLE_INTERVAL_MS}"),
            ));
        }

        if let Some(host) = &self.target_host {
            if host.parse::<IpAddr>().is_err() {
                return Err(config_err(
                    "target_host",
                    format!("'{host}' is not an IP address"),
                ));
            }
        }

        for (field, ports) in [
            ("latency_ports", &self.latency_ports),
            ("loss_ports", &self.loss_ports),
            ("connectivity_ports", &self.connectivity_ports),
        ] {
            if ports.is_empty() || ports.contains(&0) {
                return Err(config_err(field, "must be a non-empty list of non-zero ports"));
            }
        }

        for (field, timeout) in [
            ("latency_timeout_ms", self.latency_timeout_ms),
            ("loss_timeout_ms", self.loss_timeout_ms),
            ("connectivity_timeout_ms", self.connectivity_timeout_ms),
        ] {
            if timeout == 0 || timeout > MAX_PROBE_TIMEOUT_MS {
                return Err(config_err(field, format!("must be 1-{MAX_PROBE_TIMEOUT_MS}")));
            }
        }

        if self.loss_attempts == 0 || self.loss_attempts > MAX_LOSS_ATTEMPTS {
            return Err(config_err(
                "loss_attempts",
                format!("must be 1-{MAX_LOSS_ATTEMPTS}"),
            ));
        }

        if self.loss_delay_ms > MAX_LOSS_DELAY_MS {
            return Err(config_err(
                "loss_delay_ms",
                format!("must be 0-{MAX_LOSS_DELAY_MS}"),
            ));
        }

        if self.loss_every_n_cycles == 0 || self.loss_every_n_cycles > MAX_LOSS_EVERY_N_CYCLES {
            return Err(config_err(
                "loss_every_n_cycles",
                format!("must be 1-{MAX_LOSS_EVERY_N_CYCLES}"),
            ));
        }

        for (field, size) in [
            ("history_size", self.history_size),
            ("baseline_size", self.baseline_size),
        ] {
            if size == 0 || size > MAX_HISTORY_SIZE {
                return Err(config_err(field, format!("must be 1-{MAX_HISTORY_SIZE}")));
            }
        }

        if self.shutdown_timeout_secs == 0 || self.shutdown_timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS
        {
            return Err(config_err(
                "shutdown_timeout_secs",
                format!("must be 1-{MAX_SHUTDOWN_TIMEOUT_SECS}"),
            ));
        }

        Ok(())
    }

    /// 샘플링 주기
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// 정지 대기 시간
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// 명시적 프로브 대상 (검증된 IP만)
    pub fn target_ip(&self) -> Option<IpAddr> {
        self.target_host.as_deref().and_then(|h| h.parse().ok())
    }

    /// 지연 측정 계획
    pub fn latency_plan(&self) -> ProbePlan {
        ProbePlan::new(
            self.latency_ports.clone(),
            Duration::from_millis(self.latency_timeout_ms),
        )
    }

    /// 손실 측정 계획
    pub fn loss_plan(&self) -> ProbePlan {
        ProbePlan::new(
            self.loss_ports.clone(),
            Duration::from_millis(self.loss_timeout_ms),
        )
    }

    /// 손실 측정 시도 간 대기
    pub fn loss_delay(&self) -> Duration {
        Duration::from_millis(self.loss_delay_ms)
    }

    /// 연결 확인 계획
    pub fn connectivity_plan(&self) -> ProbePlan {
        ProbePlan::new(
            self.connectivity_ports.clone(),
            Duration::from_millis(self.connectivity_timeout_ms),
        )
    }
}

/// 변경 감시자 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// 감시 주기 (초)
    pub watch_interval_secs: u64,
    /// 정지 시 워커 종료 대기 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from_core(&MonitorConfig::default())
    }
}

impl WatcherConfig {
    /// core의 `MonitorConfig`에서 감시자 설정을 생성합니다.
    pub fn from_core(core: &MonitorConfig) -> Self {
        Self {
            watch_interval_secs: core.watch_interval_secs,
            shutdown_timeout_secs: core.shutdown_timeout_secs,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetmonError> {
        if self.watch_interval_secs == 0 || self.watch_interval_secs > MAX_WATCH_INTERVAL_SECS {
            return Err(config_err(
                "watch_interval_secs",
                format!("must be 1-{MAX_WATCH_INTERVAL_SECS}"),
            ));
        }
        if self.shutdown_timeout_secs == 0 || self.shutdown_timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS
        {
            return Err(config_err(
                "shutdown_timeout_secs",
                format!("must be 1-{MAX_SHUTDOWN_TIMEOUT_SECS}"),
            ));
        }
        Ok(())
    }

    /// 감시 주기
    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    /// 정지 대기 시간
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> NetmonError {
    NetmonError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}
