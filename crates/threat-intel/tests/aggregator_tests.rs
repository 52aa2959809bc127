//! 집계기 통합 테스트 -- 공개 API와 사용자 정의 소스로 검증
//!
//! core 설정 → IntelConfig → ReputationAggregator 흐름과
//! 캐시 용량 제한, 혼합 응답 통합을 확인합니다.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gotchi_core::config::GotchiConfig;
use gotchi_core::pipeline::BoxFuture;
use gotchi_core::types::ThreatLevel;
use gotchi_threat_intel::{
    IntelConfig, ReputationAggregator, ReputationSource, SourceVerdict, ThreatIntelError,
};

/// 마지막 옥텟이 홀수인 IP를 위협으로 판정하는 소스
struct OddOctetSource {
    calls: AtomicUsize,
}

impl ReputationSource for OddOctetSource {
    fn name(&self) -> &str {
        "odd-octet"
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Result<SourceVerdict, ThreatIntelError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let IpAddr::V4(v4) = ip else {
                return Err(ThreatIntelError::Decode("ipv6 not supported".to_owned()));
            };
            let odd = v4.octets()[3] % 2 == 1;
            Ok(SourceVerdict {
                source: "odd-octet".to_owned(),
                is_threat: odd,
                weight: if odd { 100 } else { 0 },
                tags: Vec::new(),
            })
        })
    }
}

fn public_ip(n: u32) -> IpAddr {
    // 203.0.113.0/24는 문서용 대역이므로 11.0.0.0/8을 사용
    IpAddr::V4(Ipv4Addr::from(0x0B00_0000 + n))
}

#[test]
fn aggregator_from_default_config_has_no_sources() {
    // Given: 소스 미설정 기본 구성
    let core = GotchiConfig::default();
    let config = IntelConfig::from_core(&core.threat_intel);

    // When
    let aggregator = ReputationAggregator::new(&config).unwrap();

    // Then
    assert!(!aggregator.has_sources());
}

#[test]
fn aggregator_builds_configured_sources() {
    let core = GotchiConfig::parse(
        r#"
[threat_intel]
enabled = true
greynoise_enabled = true
abuseipdb_api_key = "test-key"
"#,
    )
    .unwrap();
    let config = IntelConfig::from_core(&core.threat_intel);

    let aggregator = ReputationAggregator::new(&config).unwrap();

    assert_eq!(aggregator.source_names(), vec!["greynoise", "abuseipdb"]);
}

#[tokio::test]
async fn cache_capacity_is_bounded() {
    // Given: 용량 10, 일괄 제거 4
    let config = IntelConfig {
        cache_max_entries: 10,
        cache_evict_batch: 4,
        ..IntelConfig::default()
    };
    let source = Arc::new(OddOctetSource {
        calls: AtomicUsize::new(0),
    });
    let shared: Arc<dyn ReputationSource> = source.clone();
    let aggregator = ReputationAggregator::with_sources(&config, vec![shared]);

    // When: 서로 다른 공인 IP 11개 조회
    for n in 1..=11 {
        aggregator.check_ip(public_ip(n)).await;
    }

    // Then: 11 → 7로 줄고, 가장 먼저 넣은 IP는 다시 조회됨
    assert_eq!(aggregator.get_statistics().cache_size, 7);
    aggregator.check_ip(public_ip(1)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 12);
    aggregator.check_ip(public_ip(11)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn statistics_track_threats_and_hits() {
    let source: Arc<dyn ReputationSource> = Arc::new(OddOctetSource {
        calls: AtomicUsize::new(0),
    });
    let aggregator = ReputationAggregator::with_sources(&IntelConfig::default(), vec![source]);

    let threat = aggregator.check_ip(public_ip(1)).await;
    let clean = aggregator.check_ip(public_ip(2)).await;
    let again = aggregator.check_ip(public_ip(1)).await;
    aggregator.check_ip("10.0.0.1".parse().unwrap()).await;

    assert_eq!(threat.threat_level, ThreatLevel::Malicious);
    assert_eq!(threat.confidence, 100);
    assert_eq!(clean.threat_level, ThreatLevel::Benign);
    assert!(again.cached);

    let stats = aggregator.get_statistics();
    assert_eq!(stats.total_checks, 4);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_hit_rate, 25.0);
    assert_eq!(stats.malicious_ips_found, 1);
    assert_eq!(stats.cache_size, 2);
}
