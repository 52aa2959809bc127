//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `gotchi_`
//! - 모듈명: `sampler_`, `watcher_`, `classifier_`, `threat_intel_`, `daemon_`
//! - 접미어: `_total` (counter), 단위 (`_ms`, `_pct`, `_seconds`), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use gotchi_core::metrics as m;
//!
//! metrics::gauge!(m::SAMPLER_LATENCY_MS).set(12.5);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 공격 유형 레이블 키
pub const LABEL_ATTACK_TYPE: &str = "attack_type";

/// 평판 소스 레이블 키 (greynoise, abuseipdb)
pub const LABEL_SOURCE: &str = "source";

/// 위협 수준 레이블 키 (suspicious, malicious)
pub const LABEL_THREAT_LEVEL: &str = "threat_level";

// ─── Sampler 메트릭 ─────────────────────────────────────────────────

/// Sampler: 최근 지연 시간 (gauge, ms)
pub const SAMPLER_LATENCY_MS: &str = "gotchi_sampler_latency_ms";

/// Sampler: 최근 패킷 손실률 (gauge, %)
pub const SAMPLER_PACKET_LOSS_PCT: &str = "gotchi_sampler_packet_loss_pct";

/// Sampler: 윈도우 평균 지연 시간 (gauge, ms)
pub const SAMPLER_AVG_LATENCY_MS: &str = "gotchi_sampler_avg_latency_ms";

/// Sampler: 기준선 지연 시간 중앙값 (gauge, ms)
pub const SAMPLER_BASELINE_LATENCY_MS: &str = "gotchi_sampler_baseline_latency_ms";

/// Sampler: 연결 여부 (gauge, 0/1)
pub const SAMPLER_CONNECTED: &str = "gotchi_sampler_connected";

/// Sampler: 완료된 사이클 수 (counter)
pub const SAMPLER_CYCLES_TOTAL: &str = "gotchi_sampler_cycles_total";

/// Sampler: 재초기화 횟수 (counter)
pub const SAMPLER_REINITIALIZATIONS_TOTAL: &str = "gotchi_sampler_reinitializations_total";

// ─── Watcher 메트릭 ─────────────────────────────────────────────────

/// Watcher: 감지된 네트워크 변경 수 (counter)
pub const WATCHER_CHANGES_TOTAL: &str = "gotchi_watcher_changes_total";

// ─── Classifier 메트릭 ──────────────────────────────────────────────

/// Classifier: 이상 점수 (gauge, 0-100)
pub const CLASSIFIER_ANOMALY_SCORE: &str = "gotchi_classifier_anomaly_score";

/// Classifier: 신뢰도 (gauge, 0-100)
pub const CLASSIFIER_CONFIDENCE: &str = "gotchi_classifier_confidence";

/// Classifier: 현재 상태 (gauge, -1=disconnected 0=happy 1=alert 2=under_attack 3=stressed)
pub const CLASSIFIER_STATE: &str = "gotchi_classifier_state";

/// Classifier: 탐지된 공격 수 (counter, label: attack_type)
pub const CLASSIFIER_ATTACKS_TOTAL: &str = "gotchi_classifier_attacks_total";

// ─── Threat Intel 메트릭 ────────────────────────────────────────────

/// Threat Intel: IP 조회 수 (counter)
pub const THREAT_INTEL_CHECKS_TOTAL: &str = "gotchi_threat_intel_checks_total";

/// Threat Intel: 캐시 적중 수 (counter)
pub const THREAT_INTEL_CACHE_HITS_TOTAL: &str = "gotchi_threat_intel_cache_hits_total";

/// Threat Intel: 소스 실패 수 (counter, label: source)
pub const THREAT_INTEL_SOURCE_ERRORS_TOTAL: &str = "gotchi_threat_intel_source_errors_total";

/// Threat Intel: 위협으로 판정된 조회 수 (counter, label: threat_level)
pub const THREAT_INTEL_THREATS_TOTAL: &str = "gotchi_threat_intel_threats_total";

/// Threat Intel: 캐시 엔트리 수 (gauge)
pub const THREAT_INTEL_CACHE_SIZE: &str = "gotchi_threat_intel_cache_size";

/// Threat Intel: 수립된 연결 수 (gauge)
pub const THREAT_INTEL_CONNECTIONS: &str = "gotchi_threat_intel_connections";

/// Threat Intel: 연결 급증 탐지 수 (counter)
pub const THREAT_INTEL_CONNECTION_SURGES_TOTAL: &str =
    "gotchi_threat_intel_connection_surges_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "gotchi_daemon_uptime_seconds";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "gotchi_daemon_modules_registered";

/// Daemon: 빌드 정보 (gauge, label: version)
pub const DAEMON_BUILD_INFO: &str = "gotchi_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다. recorder가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Sampler
    describe_gauge!(SAMPLER_LATENCY_MS, "Most recent TCP-connect latency in ms");
    describe_gauge!(
        SAMPLER_PACKET_LOSS_PCT,
        "Most recent packet loss estimate in percent"
    );
    describe_gauge!(
        SAMPLER_AVG_LATENCY_MS,
        "Mean latency over the recent window in ms"
    );
    describe_gauge!(
        SAMPLER_BASELINE_LATENCY_MS,
        "Median latency over the baseline pool in ms"
    );
    describe_gauge!(SAMPLER_CONNECTED, "1 when the network is reachable");
    describe_counter!(SAMPLER_CYCLES_TOTAL, "Completed sampler cycles");
    describe_counter!(
        SAMPLER_REINITIALIZATIONS_TOTAL,
        "Sampler history resets after network changes"
    );

    // Watcher
    describe_counter!(
        WATCHER_CHANGES_TOTAL,
        "Network environment changes detected by fingerprint"
    );

    // Classifier
    describe_gauge!(CLASSIFIER_ANOMALY_SCORE, "Latest anomaly score (0-100)");
    describe_gauge!(CLASSIFIER_CONFIDENCE, "Latest attack confidence (0-100)");
    describe_gauge!(
        CLASSIFIER_STATE,
        "Current network state (-1 disconnected, 0 happy, 1 alert, 2 under_attack, 3 stressed)"
    );
    describe_counter!(
        CLASSIFIER_ATTACKS_TOTAL,
        "Classifications with an attack type, per attack type"
    );

    // Threat Intel
    describe_counter!(THREAT_INTEL_CHECKS_TOTAL, "IP reputation checks requested");
    describe_counter!(
        THREAT_INTEL_CACHE_HITS_TOTAL,
        "IP reputation checks answered from cache"
    );
    describe_counter!(
        THREAT_INTEL_SOURCE_ERRORS_TOTAL,
        "Reputation source failures, per source"
    );
    describe_counter!(
        THREAT_INTEL_THREATS_TOTAL,
        "Fresh reputation verdicts flagged as threats, per level"
    );
    describe_gauge!(THREAT_INTEL_CACHE_SIZE, "Entries in the reputation cache");
    describe_gauge!(
        THREAT_INTEL_CONNECTIONS,
        "Established connections seen in the last scan"
    );
    describe_counter!(
        THREAT_INTEL_CONNECTION_SURGES_TOTAL,
        "Scans where connection counts crossed a surge threshold"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_MODULES_REGISTERED, "Number of registered modules");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        SAMPLER_LATENCY_MS,
        SAMPLER_PACKET_LOSS_PCT,
        SAMPLER_AVG_LATENCY_MS,
        SAMPLER_BASELINE_LATENCY_MS,
        SAMPLER_CONNECTED,
        SAMPLER_CYCLES_TOTAL,
        SAMPLER_REINITIALIZATIONS_TOTAL,
        WATCHER_CHANGES_TOTAL,
        CLASSIFIER_ANOMALY_SCORE,
        CLASSIFIER_CONFIDENCE,
        CLASSIFIER_STATE,
        CLASSIFIER_ATTACKS_TOTAL,
        THREAT_INTEL_CHECKS_TOTAL,
        THREAT_INTEL_CACHE_HITS_TOTAL,
        THREAT_INTEL_SOURCE_ERRORS_TOTAL,
        THREAT_INTEL_THREATS_TOTAL,
        THREAT_INTEL_CACHE_SIZE,
        THREAT_INTEL_CONNECTIONS,
        THREAT_INTEL_CONNECTION_SURGES_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_MODULES_REGISTERED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_gotchi_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("gotchi_"),
                "Metric '{}' does not start with 'gotchi_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES.iter().filter(|n| n.contains("_total")) {
            assert!(name.ends_with("_total"), "'{}' has _total mid-name", name);
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        // recorder 없이 호출해도 panic하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_ATTACK_TYPE, LABEL_SOURCE, LABEL_THREAT_LEVEL] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
