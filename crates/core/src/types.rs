//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 샘플러가 발행하는 [`NetworkSample`], 분류기가 만드는 [`AttackVerdict`],
//! 평판 집계기가 캐시하는 [`ThreatRecord`] 등 크레이트 간에 교환되는 데이터 구조를 정의합니다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 초기화 중 샘플의 SSID 표시값
pub const INITIALIZING_SSID: &str = "Initializing...";

/// SSID와 네트워크 프리픽스 모두 알 수 없을 때의 표시값
pub const UNKNOWN_SSID: &str = "Unknown";

/// 네트워크 품질 샘플
///
/// 샘플러 사이클마다 하나씩 생성되며, 발행된 뒤에는 변경되지 않습니다.
/// 읽는 쪽은 항상 복사본을 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    /// 측정 시각
    pub timestamp: SystemTime,
    /// 연결 여부
    pub connected: bool,
    /// 최근 지연 시간 (ms, -1 = 알 수 없음)
    pub latency_ms: f64,
    /// 최근 패킷 손실률 (%)
    pub packet_loss_pct: f64,
    /// 최근 윈도우 평균 지연 시간 (ms)
    pub avg_latency_ms: f64,
    /// 최근 윈도우 평균 손실률 (%)
    pub avg_packet_loss_pct: f64,
    /// 기준선 지연 시간 중앙값 (ms)
    pub baseline_latency_ms: f64,
    /// 기준선 손실률 중앙값 (%)
    pub baseline_packet_loss_pct: f64,
    /// 기본 게이트웨이
    pub gateway: Option<Ipv4Addr>,
    /// 활성 인터페이스명
    pub interface: Option<String>,
    /// 무선 네트워크 이름 (또는 대체 표시값)
    pub ssid: String,
    /// 로컬 IPv4 주소
    pub local_ip: Option<Ipv4Addr>,
}

impl NetworkSample {
    /// 아직 발행된 샘플이 없을 때 반환하는 초기화 중 샘플을 생성합니다.
    ///
    /// 탐색된 게이트웨이/인터페이스 정보는 유지하고 측정값은 비워 둡니다.
    pub fn initializing(info: &NetworkInfo) -> Self {
        Self {
            timestamp: SystemTime::now(),
            connected: false,
            latency_ms: -1.0,
            packet_loss_pct: 0.0,
            avg_latency_ms: 0.0,
            avg_packet_loss_pct: 0.0,
            baseline_latency_ms: 0.0,
            baseline_packet_loss_pct: 0.0,
            gateway: info.gateway,
            interface: info.interface.clone(),
            ssid: INITIALIZING_SSID.to_owned(),
            local_ip: info.local_ip,
        }
    }

    /// 측정값이 있는 샘플인지 확인합니다.
    pub fn has_measurement(&self) -> bool {
        self.connected && self.latency_ms >= 0.0
    }
}

impl fmt::Display for NetworkSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.connected {
            return write!(f, "[{}] disconnected", self.ssid);
        }
        write!(
            f,
            "[{}] latency={:.1}ms loss={:.1}% baseline={:.1}ms",
            self.ssid, self.latency_ms, self.packet_loss_pct, self.baseline_latency_ms,
        )
    }
}

/// 탐색된 네트워크 환경 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// 기본 게이트웨이
    pub gateway: Option<Ipv4Addr>,
    /// 활성 인터페이스명
    pub interface: Option<String>,
    /// SSID (없으면 네트워크 프리픽스, 그것도 없으면 "Unknown")
    pub ssid: String,
    /// 로컬 IPv4 주소
    pub local_ip: Option<Ipv4Addr>,
    /// 로컬 주소의 앞 세 옥텟 (예: `192.168.1`)
    pub network_prefix: Option<String>,
    /// 연결 여부
    pub connected: bool,
}

/// 네트워크 상태
///
/// `Ord` 구현은 악화 순서를 따릅니다 (`Happy < Alert < UnderAttack < Stressed`).
/// `Disconnected`는 측정 불가 상태로 가장 앞에 둡니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreatState {
    /// 연결 끊김
    Disconnected,
    /// 정상
    #[default]
    Happy,
    /// 경계
    Alert,
    /// 공격 받는 중
    UnderAttack,
    /// 과부하 (어떤 밴드에도 속하지 않음)
    Stressed,
}

impl ThreatState {
    /// 메트릭 gauge용 숫자 값
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::Disconnected => -1.0,
            Self::Happy => 0.0,
            Self::Alert => 1.0,
            Self::UnderAttack => 2.0,
            Self::Stressed => 3.0,
        }
    }
}

impl fmt::Display for ThreatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Happy => write!(f, "happy"),
            Self::Alert => write!(f, "alert"),
            Self::UnderAttack => write!(f, "under_attack"),
            Self::Stressed => write!(f, "stressed"),
        }
    }
}

/// 추정 공격 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    /// 손실률 50% 초과
    #[serde(rename = "ICMP Flood / Network Saturation")]
    IcmpFlood,
    /// 손실 20% 초과 + 지연 200ms 초과
    #[serde(rename = "UDP Flood Detected")]
    UdpFlood,
    /// 지연 500ms 초과 + 손실 10% 미만
    #[serde(rename = "SYN Flood / Resource Exhaustion")]
    SynFlood,
    /// 지연 100ms 초과 + 손실 10% 초과
    #[serde(rename = "Mixed DDoS Attack")]
    MixedDdos,
    /// 지연 50ms 초과
    #[serde(rename = "Network Congestion / Slow DDoS")]
    Congestion,
}

impl AttackType {
    /// 사람이 읽는 레이블
    pub fn label(&self) -> &'static str {
        match self {
            Self::IcmpFlood => "ICMP Flood / Network Saturation",
            Self::UdpFlood => "UDP Flood Detected",
            Self::SynFlood => "SYN Flood / Resource Exhaustion",
            Self::MixedDdos => "Mixed DDoS Attack",
            Self::Congestion => "Network Congestion / Slow DDoS",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 분류 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackVerdict {
    /// 네트워크 상태
    pub state: ThreatState,
    /// 추정 공격 유형
    pub attack_type: Option<AttackType>,
    /// 이상 점수 (0-100)
    pub anomaly_score: f64,
    /// 신뢰도 (0-100)
    pub confidence: u8,
    /// 공격 유형이 식별되었는지 여부
    pub attack_detected: bool,
}

impl AttackVerdict {
    /// 점수 없이 상태만 가진 판정을 생성합니다.
    pub fn neutral(state: ThreatState) -> Self {
        Self {
            state,
            attack_type: None,
            anomaly_score: 0.0,
            confidence: 0,
            attack_detected: false,
        }
    }
}

impl fmt::Display for AttackVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attack_type {
            Some(attack) => write!(
                f,
                "{} ({attack}, anomaly={:.1}, confidence={})",
                self.state, self.anomaly_score, self.confidence,
            ),
            None => write!(
                f,
                "{} (anomaly={:.1}, confidence={})",
                self.state, self.anomaly_score, self.confidence,
            ),
        }
    }
}

/// 위협 수준
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    /// 위협 없음
    #[default]
    Benign,
    /// 의심
    Suspicious,
    /// 악성
    Malicious,
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benign => write!(f, "benign"),
            Self::Suspicious => write!(f, "suspicious"),
            Self::Malicious => write!(f, "malicious"),
        }
    }
}

/// IP 평판 조회 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    /// 조회 대상 IP
    pub ip: IpAddr,
    /// 위협 여부
    pub is_threat: bool,
    /// 위협 수준
    pub threat_level: ThreatLevel,
    /// 신뢰도 (0-100)
    pub confidence: u8,
    /// 응답한 소스 이름 (중복 없음, 응답 순서)
    pub sources: Vec<String>,
    /// 사람이 읽는 태그 (소스 순서)
    pub tags: Vec<String>,
    /// 소스별 실패 내용
    pub errors: Vec<String>,
    /// 부가 설명
    pub details: Option<String>,
    /// 캐시 저장 시각
    pub cached_since: SystemTime,
    /// 캐시에서 반환되었는지 여부
    pub cached: bool,
}

impl ThreatRecord {
    /// 위협 없음 레코드를 생성합니다.
    pub fn benign(ip: IpAddr) -> Self {
        Self {
            ip,
            is_threat: false,
            threat_level: ThreatLevel::Benign,
            confidence: 0,
            sources: Vec::new(),
            tags: Vec::new(),
            errors: Vec::new(),
            details: None,
            cached_since: SystemTime::now(),
            cached: false,
        }
    }
}

impl fmt::Display for ThreatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (confidence={}",
            self.ip, self.threat_level, self.confidence
        )?;
        if !self.sources.is_empty() {
            write!(f, " sources={}", self.sources.join(","))?;
        }
        write!(f, ")")
    }
}

/// 전송 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// ICMP (raw)
    Icmp,
    /// 기타
    Other,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Icmp => write!(f, "ICMP"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// 수립된 연결 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// 로컬 주소
    pub local_addr: SocketAddr,
    /// 원격 주소
    pub remote_addr: SocketAddr,
    /// 프로토콜
    pub protocol: Protocol,
    /// 연결 상태 (예: ESTABLISHED)
    pub status: String,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.protocol, self.local_addr, self.remote_addr, self.status,
        )
    }
}
