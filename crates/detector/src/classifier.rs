//! 네트워크 상태 분류기
//!
//! [`Classifier`]는 [`NetworkSample`] 하나를 받아 상태, 공격 유형, 이상 점수, 신뢰도를 계산합니다.
//! 호출마다 독립적이며, 진단용으로 이상 점수와 공격 유형의 최근 히스토리만 보관합니다.
//!
//! # 공격 유형 규칙
//!
//! 규칙은 서로 배타적이지 않으며, 처음 일치하는 규칙이 선택됩니다.
//!
//! | # | 조건 | 유형 |
//! |---|------|------|
//! | 1 | loss > 50 | ICMP Flood / Network Saturation |
//! | 2 | loss > 20 && latency > 200 | UDP Flood Detected |
//! | 3 | latency > 500 && loss < 10 | SYN Flood / Resource Exhaustion |
//! | 4 | latency > 100 && loss > 10 | Mixed DDoS Attack |
//! | 5 | latency > 50 | Network Congestion / Slow DDoS |

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::trace;

use gotchi_core::history::RollingHistory;
use gotchi_core::types::{AttackType, AttackVerdict, NetworkSample, ThreatState};

use crate::bands::ThresholdBands;
use crate::config::{DetectorConfig, MetricSource};
use crate::error::DetectorError;

/// 점수 상한
const MAX_SCORE: f64 = 100.0;

/// 상대 편차 1당 이상 점수
const DEVIATION_WEIGHT: f64 = 30.0;

/// 지연 시간 기여분 상한
const MAX_LATENCY_CONTRIBUTION: f64 = 50.0;

/// 규칙 순서대로 공격 유형을 결정합니다.
pub fn attack_type_for(latency_ms: f64, packet_loss_pct: f64) -> Option<AttackType> {
    if packet_loss_pct > 50.0 {
        Some(AttackType::IcmpFlood)
    } else if packet_loss_pct > 20.0 && latency_ms > 200.0 {
        Some(AttackType::UdpFlood)
    } else if latency_ms > 500.0 && packet_loss_pct < 10.0 {
        Some(AttackType::SynFlood)
    } else if latency_ms > 100.0 && packet_loss_pct > 10.0 {
        Some(AttackType::MixedDdos)
    } else if latency_ms > 50.0 {
        Some(AttackType::Congestion)
    } else {
        None
    }
}

/// 이상 점수를 계산합니다 (0-100).
///
/// 기준선이 없으면(`<= 0`) 절대 구간을, 있으면 기준선 대비 상대 편차를 사용합니다.
pub fn anomaly_score(latency_ms: f64, packet_loss_pct: f64, baseline_latency_ms: f64) -> f64 {
    let latency_part = if baseline_latency_ms <= 0.0 {
        if latency_ms > 100.0 {
            50.0
        } else if latency_ms > 50.0 {
            25.0
        } else if latency_ms > 20.0 {
            10.0
        } else {
            0.0
        }
    } else {
        let deviation = ((latency_ms - baseline_latency_ms) / baseline_latency_ms).max(0.0);
        (deviation * DEVIATION_WEIGHT).min(MAX_LATENCY_CONTRIBUTION)
    };

    let loss_part = if packet_loss_pct > 10.0 {
        50.0
    } else if packet_loss_pct > 5.0 {
        25.0
    } else if packet_loss_pct > 1.0 {
        10.0
    } else {
        0.0
    };

    let score = latency_part + loss_part;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_SCORE)
}

/// 공격 신뢰도를 계산합니다 (0-100).
pub fn confidence(latency_ms: f64, packet_loss_pct: f64) -> u8 {
    let latency_part: u32 = if latency_ms > 200.0 {
        40
    } else if latency_ms > 100.0 {
        20
    } else if latency_ms > 50.0 {
        10
    } else {
        0
    };

    let loss_part: u32 = if packet_loss_pct > 20.0 {
        60
    } else if packet_loss_pct > 10.0 {
        30
    } else if packet_loss_pct > 5.0 {
        15
    } else {
        0
    };

    u8::try_from((latency_part + loss_part).min(100)).unwrap_or(100)
}

#[derive(Debug)]
struct ClassifierHistory {
    scores: RollingHistory<f64>,
    attacks: RollingHistory<(SystemTime, AttackType)>,
}

/// 네트워크 상태 분류기
///
/// `&self`로 호출할 수 있으며 여러 태스크에서 공유해도 안전합니다.
#[derive(Debug)]
pub struct Classifier {
    bands: ThresholdBands,
    metric_source: MetricSource,
    history: Mutex<ClassifierHistory>,
}

impl Classifier {
    /// 설정으로 분류기를 생성합니다.
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        let bands = ThresholdBands::from_config(&config.bands)?;
        Ok(Self::with_bands(
            bands,
            config.metric_source,
            config.score_history_size,
            config.attack_history_size,
        ))
    }

    /// 밴드를 직접 지정해 분류기를 생성합니다.
    pub fn with_bands(
        bands: ThresholdBands,
        metric_source: MetricSource,
        score_history_size: usize,
        attack_history_size: usize,
    ) -> Self {
        Self {
            bands,
            metric_source,
            history: Mutex::new(ClassifierHistory {
                scores: RollingHistory::new(score_history_size),
                attacks: RollingHistory::new(attack_history_size),
            }),
        }
    }

    /// 샘플을 분류합니다.
    ///
    /// 연결이 끊겼거나 아직 측정값이 없으면 점수 0의 판정을 반환하고 히스토리를 갱신하지 않습니다.
    pub fn classify(&self, sample: &NetworkSample) -> AttackVerdict {
        if !sample.connected {
            return AttackVerdict::neutral(ThreatState::Disconnected);
        }
        if sample.latency_ms < 0.0 {
            return AttackVerdict::neutral(ThreatState::Happy);
        }

        let (latency, loss) = match self.metric_source {
            MetricSource::Instant => (sample.latency_ms, sample.packet_loss_pct),
            MetricSource::WindowAverage => (sample.avg_latency_ms, sample.avg_packet_loss_pct),
        };

        let state = self.bands.state_for(latency, loss);
        let attack_type = attack_type_for(latency, loss);
        let anomaly_score = anomaly_score(latency, loss, sample.baseline_latency_ms);
        let confidence = confidence(latency, loss);

        {
            let mut history = self.lock_history();
            history.scores.push(anomaly_score);
            if let Some(attack) = attack_type {
                history.attacks.push((sample.timestamp, attack));
            }
        }

        trace!(
            latency,
            loss,
            state = %state,
            anomaly_score,
            confidence,
            "sample classified"
        );

        AttackVerdict {
            state,
            attack_type,
            anomaly_score,
            confidence,
            attack_detected: attack_type.is_some(),
        }
    }

    /// 최근 이상 점수 (오래된 순)
    pub fn score_history(&self) -> Vec<f64> {
        self.lock_history().scores.to_vec()
    }

    /// 최근 공격 기록 (오래된 순)
    pub fn recent_attacks(&self) -> Vec<(SystemTime, AttackType)> {
        self.lock_history().attacks.to_vec()
    }

    /// 히스토리를 비웁니다.
    pub fn reset_history(&self) {
        let mut history = self.lock_history();
        history.scores.clear();
        history.attacks.clear();
    }

    /// 분류 입력값 선택
    pub fn metric_source(&self) -> MetricSource {
        self.metric_source
    }

    fn lock_history(&self) -> MutexGuard<'_, ClassifierHistory> {
        // 히스토리는 진단용이므로 poison 상태여도 계속 사용
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_bands(ThresholdBands::default(), MetricSource::Instant, 50, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotchi_core::types::NetworkInfo;

    fn sample(latency: f64, loss: f64, baseline: f64) -> NetworkSample {
        NetworkSample {
            connected: true,
            latency_ms: latency,
            packet_loss_pct: loss,
            avg_latency_ms: latency,
            avg_packet_loss_pct: loss,
            baseline_latency_ms: baseline,
            ..NetworkSample::initializing(&NetworkInfo::default())
        }
    }

    #[test]
    fn healthy_sample_is_happy() {
        let verdict = Classifier::default().classify(&sample(5.0, 0.0, 0.0));
        assert_eq!(verdict.state, ThreatState::Happy);
        assert_eq!(verdict.attack_type, None);
        assert_eq!(verdict.anomaly_score, 0.0);
        assert_eq!(verdict.confidence, 0);
        assert!(!verdict.attack_detected);
    }

    #[test]
    fn high_latency_without_baseline_is_syn_flood() {
        let verdict = Classifier::default().classify(&sample(600.0, 5.0, 0.0));
        assert_eq!(verdict.state, ThreatState::Stressed);
        assert_eq!(verdict.attack_type, Some(AttackType::SynFlood));
        assert_eq!(verdict.confidence, 40);
        assert_eq!(verdict.anomaly_score, 60.0);
    }

    #[test]
    fn heavy_loss_wins_over_latency_rules() {
        let verdict = Classifier::default().classify(&sample(30.0, 60.0, 0.0));
        assert_eq!(verdict.attack_type, Some(AttackType::IcmpFlood));
        assert_eq!(verdict.state, ThreatState::Stressed);
    }

    #[test]
    fn disconnected_sample_skips_history() {
        let classifier = Classifier::default();
        let mut s = sample(300.0, 30.0, 0.0);
        s.connected = false;

        let verdict = classifier.classify(&s);

        assert_eq!(verdict, AttackVerdict::neutral(ThreatState::Disconnected));
        assert!(classifier.score_history().is_empty());
    }

    #[test]
    fn unmeasured_sample_is_happy_without_history() {
        let classifier = Classifier::default();
        let verdict = classifier.classify(&sample(-1.0, 0.0, 0.0));
        assert_eq!(verdict, AttackVerdict::neutral(ThreatState::Happy));
        assert!(classifier.score_history().is_empty());
    }

    #[test]
    fn attack_rules_follow_precedence() {
        assert_eq!(attack_type_for(250.0, 25.0), Some(AttackType::UdpFlood));
        assert_eq!(attack_type_for(150.0, 15.0), Some(AttackType::MixedDdos));
        assert_eq!(attack_type_for(600.0, 15.0), Some(AttackType::MixedDdos));
        assert_eq!(attack_type_for(60.0, 0.0), Some(AttackType::Congestion));
        assert_eq!(attack_type_for(50.0, 10.0), None);
        assert_eq!(attack_type_for(600.0, 50.0), Some(AttackType::UdpFlood));
    }

    #[test]
    fn relative_deviation_is_capped() {
        // 기준선 10ms, 현재 20ms -> 편차 1.0 -> 30점
        assert_eq!(anomaly_score(20.0, 0.0, 10.0), 30.0);
        // 편차가 커도 지연 기여분은 50점까지
        assert_eq!(anomaly_score(1000.0, 0.0, 10.0), 50.0);
        // 기준선보다 빠르면 0점
        assert_eq!(anomaly_score(5.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn scores_stay_within_bounds() {
        let latencies = [-1.0, 0.0, 1.0, 25.0, 75.0, 150.0, 600.0, 10_000.0, f64::MAX];
        let losses = [0.0, 1.5, 7.0, 15.0, 30.0, 100.0];
        let baselines = [0.0, 0.001, 5.0, 100.0];

        for &latency in &latencies {
            for &loss in &losses {
                assert!(confidence(latency, loss) <= 100);
                for &baseline in &baselines {
                    let score = anomaly_score(latency, loss, baseline);
                    assert!((0.0..=100.0).contains(&score), "{latency} {loss} {baseline}");
                }
            }
        }
    }

    #[test]
    fn confidence_adds_latency_and_loss_weights() {
        assert_eq!(confidence(250.0, 25.0), 100);
        assert_eq!(confidence(150.0, 12.0), 50);
        assert_eq!(confidence(60.0, 6.0), 25);
        assert_eq!(confidence(50.0, 5.0), 0);
    }

    #[test]
    fn score_history_is_bounded() {
        let classifier =
            Classifier::with_bands(ThresholdBands::default(), MetricSource::Instant, 3, 2);
        for latency in [10.0, 30.0, 60.0, 120.0] {
            classifier.classify(&sample(latency, 0.0, 0.0));
        }

        assert_eq!(classifier.score_history(), vec![10.0, 25.0, 50.0]);
        let attacks: Vec<AttackType> = classifier
            .recent_attacks()
            .into_iter()
            .map(|(_, a)| a)
            .collect();
        assert_eq!(attacks, vec![AttackType::Congestion, AttackType::Congestion]);

        classifier.reset_history();
        assert!(classifier.score_history().is_empty());
        assert!(classifier.recent_attacks().is_empty());
    }

    #[test]
    fn window_average_source_reads_averages() {
        let classifier =
            Classifier::with_bands(ThresholdBands::default(), MetricSource::WindowAverage, 50, 100);
        let mut s = sample(600.0, 0.0, 0.0);
        s.avg_latency_ms = 5.0;
        s.avg_packet_loss_pct = 0.0;

        let verdict = classifier.classify(&s);

        assert_eq!(verdict.state, ThreatState::Happy);
        assert_eq!(verdict.attack_type, None);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = DetectorConfig {
            attack_history_size: 0,
            ..DetectorConfig::default()
        };
        assert!(Classifier::new(&config).is_err());
    }
}
