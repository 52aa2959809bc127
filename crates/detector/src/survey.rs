//! 연결 급증 탐지
//!
//! 활성 연결 목록을 원격 IP별로 집계하고, 단일 IP 또는 전체 연결 수가
//! 임계값 이상이면 급증으로 판정합니다.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

use gotchi_core::types::{Connection, Protocol};

use crate::config::SurveyConfig;

/// 연결 상황 수준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyLevel {
    /// 정상
    #[default]
    Normal,
    /// 연결 수가 경고 임계값 초과
    Warning,
    /// 급증 탐지
    Critical,
}

impl fmt::Display for SurveyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// 프로토콜별 연결 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolCounts {
    /// TCP
    pub tcp: usize,
    /// UDP
    pub udp: usize,
    /// ICMP
    pub icmp: usize,
    /// 기타
    pub other: usize,
}

impl ProtocolCounts {
    fn add(&mut self, protocol: Protocol) {
        match protocol {
            Protocol::Tcp => self.tcp += 1,
            Protocol::Udp => self.udp += 1,
            Protocol::Icmp => self.icmp += 1,
            Protocol::Other => self.other += 1,
        }
    }
}

/// 연결 집계 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionSurvey {
    /// 전체 연결 수
    pub total_connections: usize,
    /// 원격 IP별 연결 수
    pub per_ip: BTreeMap<IpAddr, usize>,
    /// 단일 IP 임계값을 넘은 IP (정렬됨)
    pub surge_ips: Vec<IpAddr>,
    /// 급증 여부 (단일 IP 또는 전체 임계값)
    pub surge_detected: bool,
    /// 프로토콜 분포
    pub protocols: ProtocolCounts,
    /// 연결 상황 수준
    pub level: SurveyLevel,
}

impl ConnectionSurvey {
    /// 연결 목록을 집계합니다.
    pub fn analyze(connections: &[Connection], config: &SurveyConfig) -> Self {
        let mut per_ip: BTreeMap<IpAddr, usize> = BTreeMap::new();
        let mut protocols = ProtocolCounts::default();

        for conn in connections {
            *per_ip.entry(conn.remote_addr.ip()).or_default() += 1;
            protocols.add(conn.protocol);
        }

        let surge_ips: Vec<IpAddr> = per_ip
            .iter()
            .filter(|&(_, &count)| count >= config.per_ip_threshold)
            .map(|(ip, _)| *ip)
            .collect();

        let total_connections = connections.len();
        let surge_detected = !surge_ips.is_empty() || total_connections >= config.total_threshold;

        let level = if surge_detected {
            SurveyLevel::Critical
        } else if total_connections > config.warning_threshold {
            SurveyLevel::Warning
        } else {
            SurveyLevel::Normal
        };

        Self {
            total_connections,
            per_ip,
            surge_ips,
            surge_detected,
            protocols,
            level,
        }
    }

    /// 중복 없는 원격 IP 목록 (정렬됨)
    pub fn unique_ips(&self) -> Vec<IpAddr> {
        self.per_ip.keys().copied().collect()
    }

    /// 연결 수가 많은 순으로 상위 `n`개 IP
    pub fn top_talkers(&self, n: usize) -> Vec<(IpAddr, usize)> {
        let mut counts: Vec<(IpAddr, usize)> = self.per_ip.iter().map(|(ip, c)| (*ip, *c)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }
}

/// 급증 IP가 새로 생긴 경우만 골라냅니다.
pub fn new_surge_ips(previous: &ConnectionSurvey, current: &ConnectionSurvey) -> Vec<IpAddr> {
    let before: HashSet<&IpAddr> = previous.surge_ips.iter().collect();
    current
        .surge_ips
        .iter()
        .filter(|ip| !before.contains(ip))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn conn(remote: &str, protocol: Protocol) -> Connection {
        Connection {
            local_addr: "192.168.1.20:50000".parse::<SocketAddr>().unwrap(),
            remote_addr: format!("{remote}:443").parse::<SocketAddr>().unwrap(),
            protocol,
            status: "ESTABLISHED".to_owned(),
        }
    }

    fn repeat(remote: &str, n: usize) -> Vec<Connection> {
        (0..n).map(|_| conn(remote, Protocol::Tcp)).collect()
    }

    #[test]
    fn empty_connections_are_normal() {
        let survey = ConnectionSurvey::analyze(&[], &SurveyConfig::default());
        assert_eq!(survey.total_connections, 0);
        assert!(!survey.surge_detected);
        assert_eq!(survey.level, SurveyLevel::Normal);
        assert!(survey.unique_ips().is_empty());
    }

    #[test]
    fn single_ip_at_threshold_is_surge() {
        let mut connections = repeat("203.0.113.9", 50);
        connections.extend(repeat("198.51.100.1", 3));

        let survey = ConnectionSurvey::analyze(&connections, &SurveyConfig::default());

        assert!(survey.surge_detected);
        assert_eq!(survey.surge_ips, vec!["203.0.113.9".parse::<IpAddr>().unwrap()]);
        assert_eq!(survey.level, SurveyLevel::Critical);
    }

    #[test]
    fn total_threshold_is_surge_without_hot_ip() {
        let connections: Vec<Connection> = (0..100)
            .map(|i| conn(&format!("198.51.100.{}", i % 50), Protocol::Tcp))
            .collect();

        let survey = ConnectionSurvey::analyze(&connections, &SurveyConfig::default());

        assert!(survey.surge_detected);
        assert!(survey.surge_ips.is_empty());
        assert_eq!(survey.unique_ips().len(), 50);
    }

    #[test]
    fn busy_but_below_thresholds_is_warning() {
        let connections: Vec<Connection> = (0..25)
            .map(|i| conn(&format!("198.51.100.{i}"), Protocol::Tcp))
            .collect();

        let survey = ConnectionSurvey::analyze(&connections, &SurveyConfig::default());

        assert!(!survey.surge_detected);
        assert_eq!(survey.level, SurveyLevel::Warning);
    }

    #[test]
    fn protocols_are_counted() {
        let connections = vec![
            conn("198.51.100.1", Protocol::Tcp),
            conn("198.51.100.2", Protocol::Tcp),
            conn("198.51.100.3", Protocol::Udp),
        ];
        let survey = ConnectionSurvey::analyze(&connections, &SurveyConfig::default());
        assert_eq!(survey.protocols.tcp, 2);
        assert_eq!(survey.protocols.udp, 1);
        assert_eq!(survey.protocols.icmp, 0);
    }

    #[test]
    fn top_talkers_orders_by_count() {
        let mut connections = repeat("198.51.100.1", 2);
        connections.extend(repeat("198.51.100.2", 5));
        connections.extend(repeat("198.51.100.3", 1));

        let survey = ConnectionSurvey::analyze(&connections, &SurveyConfig::default());
        let top = survey.top_talkers(2);

        assert_eq!(top[0], ("198.51.100.2".parse().unwrap(), 5));
        assert_eq!(top[1], ("198.51.100.1".parse().unwrap(), 2));
    }

    #[test]
    fn new_surge_ips_excludes_known() {
        let config = SurveyConfig {
            per_ip_threshold: 2,
            ..SurveyConfig::default()
        };
        let first = ConnectionSurvey::analyze(&repeat("198.51.100.1", 2), &config);
        let mut connections = repeat("198.51.100.1", 2);
        connections.extend(repeat("198.51.100.2", 3));
        let second = ConnectionSurvey::analyze(&connections, &config);

        assert_eq!(
            new_surge_ips(&first, &second),
            vec!["198.51.100.2".parse::<IpAddr>().unwrap()]
        );
    }
}
