//! 용량이 제한된 IP 집합
//!
//! 삽입 순서를 기억하고, 용량을 넘으면 가장 오래된 IP를 묶음 단위로 잊습니다.
//! 위협 IP 목록과 daemon의 "이미 조회한 IP" 목록이 함께 사용합니다.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;

/// 삽입 순서 기반 묶음 제거를 하는 IP 집합
#[derive(Debug, Clone)]
pub struct RecentIps {
    capacity: usize,
    evict_batch: usize,
    set: HashSet<IpAddr>,
    order: VecDeque<IpAddr>,
}

impl RecentIps {
    /// `capacity`를 넘으면 오래된 `evict_batch`개를 제거하는 집합을 만듭니다.
    ///
    /// 두 값은 최소 1이며, 묶음 크기는 용량을 넘지 않도록 보정됩니다.
    pub fn new(capacity: usize, evict_batch: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            evict_batch: evict_batch.clamp(1, capacity),
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// IP를 추가합니다. 새로 추가되었으면 `true`.
    pub fn insert(&mut self, ip: IpAddr) -> bool {
        if !self.set.insert(ip) {
            return false;
        }
        self.order.push_back(ip);
        if self.order.len() > self.capacity {
            for old in self.order.drain(..self.evict_batch) {
                self.set.remove(&old);
            }
        }
        true
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.set.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 정렬된 IP 목록
    pub fn sorted(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.order.iter().copied().collect();
        ips.sort();
        ips
    }
}
