//! 분류 시나리오 테스트 -- 설정 로드부터 판정까지
//!
//! gotchi.toml 섹션 → DetectorConfig → Classifier → AttackVerdict
//! 흐름을 공개 API로 검증합니다.

use gotchi_core::config::{BandLimit, GotchiConfig};
use gotchi_core::types::{AttackType, NetworkInfo, NetworkSample, ThreatState};
use gotchi_detector::{Classifier, DetectorConfig, MetricSource};

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
fn classifier_from_default_config() {
    // Given: 기본 설정으로 생성한 분류기
    let core = GotchiConfig::default();
    let config = DetectorConfig::from_core(&core.classifier).unwrap();
    let classifier = Classifier::new(&config).unwrap();

    // When: 정상, 혼잡, 공격 샘플을 차례로 분류
    let calm = classifier.classify(&sample(4.0, 0.0, 5.0));
    let congested = classifier.classify(&sample(70.0, 2.0, 5.0));
    let flooded = classifier.classify(&sample(350.0, 35.0, 5.0));

    // Then
    assert_eq!(calm.state, ThreatState::Happy);
    assert_eq!(congested.state, ThreatState::UnderAttack);
    assert_eq!(congested.attack_type, Some(AttackType::Congestion));
    assert_eq!(flooded.state, ThreatState::Stressed);
    assert_eq!(flooded.attack_type, Some(AttackType::UdpFlood));
    assert_eq!(flooded.anomaly_score, 100.0);
    assert_eq!(flooded.confidence, 100);
    assert_eq!(classifier.score_history().len(), 3);
    assert_eq!(classifier.recent_attacks().len(), 2);
}

#[test]
fn custom_bands_from_toml() {
    let core = GotchiConfig::parse(
        r#"
[classifier]
metric_source = "window_average"

[classifier.bands]
happy = { max_latency_ms = 30.0, max_packet_loss_pct = 2.0 }
alert = { max_latency_ms = 80.0, max_packet_loss_pct = 5.0 }
under_attack = { max_latency_ms = 250.0, max_packet_loss_pct = 20.0 }
"#,
    )
    .unwrap();
    let config = DetectorConfig::from_core(&core.classifier).unwrap();
    assert_eq!(config.metric_source, MetricSource::WindowAverage);
    assert_eq!(config.bands.happy, BandLimit::new(30.0, 2.0));

    let classifier = Classifier::new(&config).unwrap();
    assert_eq!(
        classifier.classify(&sample(25.0, 1.0, 0.0)).state,
        ThreatState::Happy
    );
    assert_eq!(
        classifier.classify(&sample(220.0, 1.0, 0.0)).state,
        ThreatState::UnderAttack
    );
}

#[test]
fn verdict_serializes_with_labels() {
    let classifier = Classifier::default();
    let verdict = classifier.classify(&sample(30.0, 60.0, 0.0));

    let json = serde_json::to_value(&verdict).unwrap();

    assert_eq!(json["state"], "stressed");
    assert_eq!(json["attack_type"], "ICMP Flood / Network Saturation");
}
