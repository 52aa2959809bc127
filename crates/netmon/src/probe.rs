//! TCP connect 기반 연결 프로브
//!
//! 지연과 손실은 패킷 캡처 없이 TCP 연결 시도의 소요 시간과 응답 여부로만 추정합니다.
//! 연결 성공과 명시적 거부(RST) 모두 "호스트가 응답함"으로 취급합니다.
//!
//! 모든 함수는 에러를 반환하지 않고 sentinel 값으로 degrade합니다.
//! - 지연: 알 수 없으면 [`UNKNOWN_LATENCY_MS`] (-1)
//! - 손실: 연결되지 않았으면 100%, 응답이 하나도 없으면 0%
//!
//! 실제 소켓 연결은 [`TcpConnector`] trait 뒤에 있어 테스트에서 교체할 수 있습니다.

use std::future::Future;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::trace;

/// 지연을 알 수 없음을 나타내는 값
pub const UNKNOWN_LATENCY_MS: f64 = -1.0;

/// 프로브는 모두 실패했지만 게이트웨이를 신뢰할 때 보고하는 명목 지연
pub const NOMINAL_LATENCY_MS: f64 = 1.0;

/// 단일 연결 시도 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 연결 성공
    Connected(Duration),
    /// 명시적 거부 (호스트는 살아 있음)
    Refused(Duration),
    /// 타임아웃 또는 도달 불가
    Failed,
}

impl ProbeOutcome {
    /// 호스트가 응답했는지 (성공 또는 거부)
    pub fn answered(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// 응답까지 걸린 시간
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Connected(d) | Self::Refused(d) => Some(*d),
            Self::Failed => None,
        }
    }
}

/// 포트 목록 + 시도별 타임아웃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePlan {
    /// 시도할 포트 (순서대로 또는 순환)
    pub ports: Vec<u16>,
    /// 시도별 타임아웃
    pub timeout: Duration,
}

impl ProbePlan {
    /// 새 프로브 계획을 생성합니다.
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }
}

/// TCP 연결 시도 추상화
///
/// 구현체는 반드시 `timeout` 안에 결과를 반환해야 합니다.
pub trait TcpConnector: Send + Sync + 'static {
    /// `addr`로 연결을 시도합니다.
    fn connect(
        &self,
        addr: SocketAddr,
        timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send;
}

/// tokio `TcpStream` 기반 연결기
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioConnector;

impl TcpConnector for TokioConnector {
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
        let started = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => ProbeOutcome::Connected(started.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                ProbeOutcome::Refused(started.elapsed())
            }
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "probe connect failed");
                ProbeOutcome::Failed
            }
            Err(_) => {
                trace!(%addr, "probe connect timed out");
                ProbeOutcome::Failed
            }
        }
    }
}

fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// 지연 시간을 측정합니다 (ms).
///
/// 포트를 순서대로 시도해 처음 응답한 포트의 소요 시간을 반환합니다.
/// 모두 실패하면 `gateway_known`일 때 [`NOMINAL_LATENCY_MS`], 아니면 [`UNKNOWN_LATENCY_MS`].
pub async fn measure_latency<C: TcpConnector>(
    connector: &C,
    host: IpAddr,
    plan: &ProbePlan,
    gateway_known: bool,
) -> f64 {
    for &port in &plan.ports {
        let outcome = connector
            .connect(SocketAddr::new(host, port), plan.timeout)
            .await;
        if let Some(elapsed) = outcome.elapsed() {
            return as_millis(elapsed);
        }
    }

    if gateway_known {
        NOMINAL_LATENCY_MS
    } else {
        UNKNOWN_LATENCY_MS
    }
}

/// 패킷 손실률을 추정합니다 (%).
///
/// `attempts`번 연결을 시도하며 포트는 시도 순번으로 순환합니다.
/// 연결되지 않은 상태면 시도 없이 100을 반환합니다.
/// 응답이 하나도 없으면 측정 방식이 결론을 못 낸 것으로 보고 0을 반환합니다.
pub async fn measure_packet_loss<C: TcpConnector>(
    connector: &C,
    host: IpAddr,
    plan: &ProbePlan,
    attempts: u32,
    inter_attempt_delay: Duration,
    connected: bool,
) -> f64 {
    if !connected || attempts == 0 || plan.ports.is_empty() {
        return 100.0;
    }

    let mut answered = 0u32;
    for attempt in 0..attempts {
        let port = plan.ports[attempt as usize % plan.ports.len()];
        if connector
            .connect(SocketAddr::new(host, port), plan.timeout)
            .await
            .answered()
        {
            answered += 1;
        }
        if attempt + 1 < attempts && !inter_attempt_delay.is_zero() {
            tokio::time::sleep(inter_attempt_delay).await;
        }
    }

    if answered == 0 {
        return 0.0;
    }

    f64::from(attempts - answered) / f64::from(attempts) * 100.0
}

/// 도달 가능 여부를 확인합니다.
///
/// 게이트웨이가 없으면 항상 `false`. 포트 하나라도 응답하면 `true`.
/// 모두 실패하면 `trust_gateway`를 반환합니다.
pub async fn check_connectivity<C: TcpConnector>(
    connector: &C,
    gateway_known: bool,
    host: Option<IpAddr>,
    plan: &ProbePlan,
    trust_gateway: bool,
) -> bool {
    if !gateway_known {
        return false;
    }
    let Some(host) = host else {
        return false;
    };

    for &port in &plan.ports {
        if connector
            .connect(SocketAddr::new(host, port), plan.timeout)
            .await
            .answered()
        {
            return true;
        }
    }

    trust_gateway
}

/// 테스트용 스크립트 연결기
///
/// 포트별 결과를 지정하고, 지정되지 않은 포트는 기본 결과를 반환합니다.
/// 모든 호출을 기록합니다.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    by_port: std::collections::HashMap<u16, ProbeOutcome>,
    fallback: Option<ProbeOutcome>,
    sequence: std::sync::Mutex<std::collections::VecDeque<ProbeOutcome>>,
    calls: std::sync::Mutex<Vec<SocketAddr>>,
}

#[cfg(test)]
impl ScriptedConnector {
    /// 모든 시도가 실패하는 연결기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 특정 포트의 결과를 지정합니다.
    pub fn with_port(mut self, port: u16, outcome: ProbeOutcome) -> Self {
        self.by_port.insert(port, outcome);
        self
    }

    /// 지정되지 않은 포트의 기본 결과를 지정합니다.
    pub fn with_fallback(mut self, outcome: ProbeOutcome) -> Self {
        self.fallback = Some(outcome);
        self
    }

    /// 호출 순서대로 소비되는 결과를 지정합니다 (포트 지정보다 우선).
    pub fn with_sequence(self, outcomes: Vec<ProbeOutcome>) -> Self {
        *self.sequence.lock().unwrap() = outcomes.into();
        self
    }

    /// 기록된 호출 목록
    pub fn calls(&self) -> Vec<SocketAddr> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TcpConnector for ScriptedConnector {
    async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> ProbeOutcome {
        self.calls.lock().unwrap().push(addr);
        if let Some(outcome) = self.sequence.lock().unwrap().pop_front() {
            return outcome;
        }
        self.by_port
            .get(&addr.port())
            .copied()
            .or(self.fallback)
            .unwrap_or(ProbeOutcome::Failed)
    }
}
