//! 다중 소스 평판 집계기
//!
//! [`ReputationAggregator::check_ip`]는 비공개 주소를 걸러내고, 캐시를 확인한 뒤,
//! 모든 소스를 동시에 조회(소스별 간격 제한 + 타임아웃)하여 하나의
//! [`ThreatRecord`]로 합칩니다. 소스 실패는 레코드의 `errors`에 남고
//! 조회 자체는 항상 결과를 반환합니다.
//!
//! 같은 IP에 대한 조회가 진행 중이면 뒤따른 호출은 소스를 다시 부르지 않고
//! 진행 중인 조회의 결과를 공유받습니다.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use gotchi_core::metrics as m;
use gotchi_core::types::{ThreatLevel, ThreatRecord};

use crate::abuseipdb::AbuseIpDbSource;
use crate::cache::ThreatCache;
use crate::config::IntelConfig;
use crate::error::ThreatIntelError;
use crate::greynoise::GreyNoiseSource;
use crate::limiter::RateLimiter;
use crate::recent::RecentIps;
use crate::source::{ReputationSource, SourceVerdict};

/// 평균 가중치가 이 값 이상이면 malicious
const MALICIOUS_CONFIDENCE: f64 = 75.0;

/// 소스가 하나도 없을 때의 설명
pub const NO_SOURCES_DETAILS: &str = "no sources configured";
/// 비공개 주소일 때의 설명
pub const NON_PUBLIC_DETAILS: &str = "non-public address";

/// 집계 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelStatistics {
    /// 전체 조회 요청 수 (비공개 주소 포함)
    pub total_checks: u64,
    /// 캐시 적중 수
    pub cache_hits: u64,
    /// 캐시 적중률 (%, 소수점 한 자리)
    pub cache_hit_rate: f64,
    /// 보관 중인 위협 IP 수 (캐시 용량으로 제한)
    pub malicious_ips_found: usize,
    /// 캐시 엔트리 수
    pub cache_size: usize,
}

/// 간격 제한 게이트가 붙은 소스
struct GatedSource {
    source: Arc<dyn ReputationSource>,
    limiter: RateLimiter,
}

impl GatedSource {
    fn new(source: Arc<dyn ReputationSource>) -> Self {
        let limiter = RateLimiter::new(source.min_interval());
        Self { source, limiter }
    }

    async fn query(&self, ip: IpAddr) -> Result<SourceVerdict, ThreatIntelError> {
        self.limiter.acquire().await;
        let timeout = self.source.timeout();
        match tokio::time::timeout(timeout, self.source.lookup(ip)).await {
            Ok(result) => result,
            Err(_) => Err(ThreatIntelError::Timeout(timeout)),
        }
    }
}

struct AggregatorState {
    cache: ThreatCache,
    /// 캐시와 같은 용량/묶음 크기로 제한됨
    malicious: RecentIps,
}

/// 진행 중인 조회 결과를 기다리는 수신자 (IP별)
type InFlight = HashMap<IpAddr, watch::Receiver<Option<ThreatRecord>>>;

enum Lookup {
    /// 이 호출이 소스를 조회하고 결과를 보냄
    Leader(watch::Sender<Option<ThreatRecord>>),
    /// 다른 호출의 결과를 기다림
    Follower(watch::Receiver<Option<ThreatRecord>>),
}

/// 드롭될 때 진행 중 표시를 지움 (조회가 취소된 경우 포함)
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<InFlight>,
    ip: IpAddr,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.ip);
    }
}

/// 다중 소스 IP 평판 집계기
pub struct ReputationAggregator {
    sources: Vec<GatedSource>,
    state: Mutex<AggregatorState>,
    in_flight: Mutex<InFlight>,
    total_checks: AtomicU64,
    cache_hits: AtomicU64,
}

impl ReputationAggregator {
    /// 설정에 따라 GreyNoise/AbuseIPDB 소스를 구성합니다.
    pub fn new(config: &IntelConfig) -> Result<Self, ThreatIntelError> {
        config.validate()?;

        let mut sources: Vec<Arc<dyn ReputationSource>> = Vec::new();
        if config.greynoise_enabled {
            sources.push(Arc::new(GreyNoiseSource::new(&config.greynoise_base_url)?));
        }
        if let Some(key) = config.abuseipdb_key() {
            sources.push(Arc::new(AbuseIpDbSource::new(
                &config.abuseipdb_base_url,
                key,
            )?));
        }

        Ok(Self::with_sources(config, sources))
    }

    /// 주어진 소스로 집계기를 생성합니다. 캐시 설정만 `config`에서 읽습니다.
    pub fn with_sources(config: &IntelConfig, sources: Vec<Arc<dyn ReputationSource>>) -> Self {
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        info!(sources = ?names, "reputation aggregator ready");

        Self {
            sources: sources.into_iter().map(GatedSource::new).collect(),
            state: Mutex::new(AggregatorState {
                cache: ThreatCache::new(
                    config.cache_ttl(),
                    config.cache_max_entries,
                    config.cache_evict_batch,
                ),
                malicious: RecentIps::new(config.cache_max_entries, config.cache_evict_batch),
            }),
            in_flight: Mutex::new(HashMap::new()),
            total_checks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// 활성 소스 이름 목록
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|gated| gated.source.name().to_owned())
            .collect()
    }

    /// 활성 소스가 있는지 확인합니다.
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// IP 평판을 조회합니다.
    ///
    /// 같은 IP를 동시에 조회하면 소스 조회는 한 번만 일어나고, 나머지 호출은
    /// 그 결과를 캐시 적중으로 받습니다.
    pub async fn check_ip(&self, ip: IpAddr) -> ThreatRecord {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::THREAT_INTEL_CHECKS_TOTAL).increment(1);

        if !is_public(ip) {
            let mut record = ThreatRecord::benign(ip);
            record.details = Some(NON_PUBLIC_DETAILS.to_owned());
            return record;
        }

        if let Some(hit) = self.lock_state().cache.get(&ip) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::THREAT_INTEL_CACHE_HITS_TOTAL).increment(1);
            debug!(ip = %ip, "threat intel cache hit");
            return hit;
        }

        if self.sources.is_empty() {
            let mut record = ThreatRecord::benign(ip);
            record.details = Some(NO_SOURCES_DETAILS.to_owned());
            return record;
        }

        let sender = match self.join_lookup(ip) {
            Lookup::Leader(tx) => Some(tx),
            Lookup::Follower(mut rx) => {
                let shared = rx
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|value| value.clone());
                if let Some(mut record) = shared {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::THREAT_INTEL_CACHE_HITS_TOTAL).increment(1);
                    debug!(ip = %ip, "joined in-flight threat intel lookup");
                    record.cached = true;
                    return record;
                }
                // 앞선 조회가 결과 없이 취소됨
                None
            }
        };
        let _guard = sender.as_ref().map(|_| InFlightGuard {
            in_flight: &self.in_flight,
            ip,
        });

        let results = join_all(self.sources.iter().map(|gated| async move {
            (gated.source.name(), gated.query(ip).await)
        }))
        .await;
        let record = combine_verdicts(ip, results);

        {
            let mut state = self.lock_state();
            let evicted = state.cache.insert(record.clone());
            if evicted > 0 {
                debug!(evicted, "threat intel cache evicted oldest entries");
            }
            if record.is_threat {
                state.malicious.insert(ip);
            }
            metrics::gauge!(m::THREAT_INTEL_CACHE_SIZE).set(state.cache.len() as f64);
        }
        if let Some(tx) = sender {
            tx.send_replace(Some(record.clone()));
        }

        if record.is_threat {
            metrics::counter!(
                m::THREAT_INTEL_THREATS_TOTAL,
                m::LABEL_THREAT_LEVEL => record.threat_level.to_string()
            )
            .increment(1);
            warn!(
                ip = %ip,
                level = %record.threat_level,
                confidence = record.confidence,
                tags = ?record.tags,
                "threat detected"
            );
        } else {
            debug!(ip = %ip, sources = ?record.sources, "ip checked");
        }

        record
    }

    /// 집계 통계를 반환합니다.
    pub fn get_statistics(&self) -> IntelStatistics {
        let total_checks = self.total_checks.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let rate = cache_hits as f64 / total_checks.max(1) as f64 * 100.0;
        let state = self.lock_state();

        IntelStatistics {
            total_checks,
            cache_hits,
            cache_hit_rate: (rate * 10.0).round() / 10.0,
            malicious_ips_found: state.malicious.len(),
            cache_size: state.cache.len(),
        }
    }

    /// 위협으로 판정된 IP 목록 (정렬됨, 캐시 용량만큼 보관)
    pub fn malicious_ips(&self) -> Vec<IpAddr> {
        self.lock_state().malicious.sorted()
    }

    /// 진행 중인 조회가 있으면 합류하고, 없으면 새로 등록합니다.
    fn join_lookup(&self, ip: IpAddr) -> Lookup {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = in_flight.get(&ip) {
            return Lookup::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        in_flight.insert(ip, rx);
        Lookup::Leader(tx)
    }

    fn lock_state(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 소스별 결과를 하나의 레코드로 합칩니다.
///
/// 실패는 판정에 기여하지 않고 `"{source}: {error}"`로 기록됩니다.
/// 신뢰도는 위협 가중치 합을 응답한 소스 수로 나눈 값(최대 100)입니다.
pub fn combine_verdicts<'a, I>(ip: IpAddr, results: I) -> ThreatRecord
where
    I: IntoIterator<Item = (&'a str, Result<SourceVerdict, ThreatIntelError>)>,
{
    let mut record = ThreatRecord::benign(ip);
    let mut threats = 0u32;
    let mut total_weight = 0u32;

    for (name, result) in results {
        match result {
            Ok(verdict) => {
                if !record.sources.iter().any(|s| s == &verdict.source) {
                    record.sources.push(verdict.source.clone());
                }
                if verdict.is_threat {
                    threats += 1;
                    total_weight += verdict.weight;
                }
                record.tags.extend(verdict.tags);
            }
            Err(err) => {
                metrics::counter!(
                    m::THREAT_INTEL_SOURCE_ERRORS_TOTAL,
                    m::LABEL_SOURCE => name.to_owned()
                )
                .increment(1);
                debug!(source = name, error = %err, "reputation source failed");
                record.errors.push(format!("{name}: {err}"));
            }
        }
    }

    if threats > 0 {
        let answered = record.sources.len().max(1) as f64;
        let average = f64::from(total_weight) / answered;
        record.is_threat = true;
        record.confidence = average.min(100.0).round() as u8;
        record.threat_level = if average >= MALICIOUS_CONFIDENCE {
            ThreatLevel::Malicious
        } else {
            ThreatLevel::Suspicious
        };
    }

    record
}

/// 외부 평판 조회 대상이 되는 공인 주소인지 확인합니다.
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00;
    let link_local = first & 0xffc0 == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || unique_local || link_local)
}
