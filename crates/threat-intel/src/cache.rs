//! 평판 조회 결과 TTL 캐시
//!
//! 용량을 넘으면 삽입 순서가 가장 오래된 엔트리부터 일괄 제거합니다 (LRU 아님).
//! 만료된 엔트리는 조회 시 제거하지 않고 다음 삽입에서 덮어씁니다.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::Duration;

use tokio::time::Instant;

use gotchi_core::types::ThreatRecord;

#[derive(Debug)]
struct CacheEntry {
    record: ThreatRecord,
    inserted_at: Instant,
}

/// IP별 조회 결과 캐시
#[derive(Debug)]
pub struct ThreatCache {
    ttl: Duration,
    max_entries: usize,
    evict_batch: usize,
    entries: HashMap<IpAddr, CacheEntry>,
    /// 삽입 순서 (앞쪽이 오래됨)
    order: VecDeque<IpAddr>,
}

impl ThreatCache {
    /// 새 캐시를 생성합니다.
    pub fn new(ttl: Duration, max_entries: usize, evict_batch: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            evict_batch: evict_batch.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// TTL 안의 결과가 있으면 `cached = true`로 표시한 복제본을 반환합니다.
    pub fn get(&self, ip: &IpAddr) -> Option<ThreatRecord> {
        let entry = self.entries.get(ip)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            return None;
        }
        let mut record = entry.record.clone();
        record.cached = true;
        Some(record)
    }

    /// 결과를 저장합니다. 기존 키는 가장 최근 위치로 이동합니다.
    ///
    /// 저장 후 용량을 넘었으면 제거한 엔트리 수를 반환합니다.
    pub fn insert(&mut self, record: ThreatRecord) -> usize {
        let ip = record.ip;
        if self.entries.contains_key(&ip) {
            self.order.retain(|existing| *existing != ip);
        }
        self.entries.insert(
            ip,
            CacheEntry {
                record,
                inserted_at: Instant::now(),
            },
        );
        self.order.push_back(ip);

        if self.entries.len() > self.max_entries {
            self.evict_oldest()
        } else {
            0
        }
    }

    fn evict_oldest(&mut self) -> usize {
        let count = self.evict_batch.min(self.order.len());
        for ip in self.order.drain(..count) {
            self.entries.remove(&ip);
        }
        count
    }

    /// 저장된 엔트리 수 (만료 포함)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 키가 저장되어 있는지 확인합니다 (만료 여부 무관).
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.entries.contains_key(ip)
    }

    /// 모든 엔트리를 제거합니다.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
