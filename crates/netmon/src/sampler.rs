//! 네트워크 품질 샘플러 -- 주기적 측정과 스냅샷 발행
//!
//! [`Sampler`]는 core의 [`Pipeline`] trait을 구현하여
//! `gotchi-daemon`에서 다른 워커와 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//!
//! ```text
//!                    reinitialize() ──> AtomicBool (pending)
//!                                              │
//!  interval tick ──> SamplerWorker::run_cycle ─┘
//!                         │
//!                         ├── check_connectivity
//!                         ├── measure_latency
//!                         ├── measure_packet_loss (N 사이클마다)
//!                         └── RollingHistory x4 (window / baseline)
//!                         │
//!                         ▼
//!              watch::Sender<Option<NetworkSample>> ──> SamplerHandle (clone on read)
//! ```
//!
//! 워커 태스크가 히스토리와 발행 채널의 유일한 쓰기 주체입니다.
//! 재초기화 요청은 플래그로 합쳐지며 다음 사이클 시작 시 한 번만 적용됩니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gotchi_core::error::{GotchiError, PipelineError};
use gotchi_core::history::RollingHistory;
use gotchi_core::metrics as m;
use gotchi_core::pipeline::{HealthStatus, Pipeline};
use gotchi_core::types::{NetworkInfo, NetworkSample};

use crate::config::SamplerConfig;
use crate::discovery::{NetworkDiscovery, discover_environment};
use crate::error::NetmonError;
use crate::probe::{
    TcpConnector, UNKNOWN_LATENCY_MS, check_connectivity, measure_latency, measure_packet_loss,
};

/// 샘플러 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 네트워크 품질 샘플러
///
/// 시작 시 네트워크 환경을 한 번 탐색하고, 이후 주기마다 연결성, 지연 시간, 손실률을 측정해
/// [`NetworkSample`]을 발행합니다. 읽기는 [`SamplerHandle`]을 통해 이뤄집니다.
///
/// `stop()` 후 `start()`를 다시 호출할 수 있으며, 히스토리는 새로 시작합니다.
pub struct Sampler<D: NetworkDiscovery, C: TcpConnector> {
    /// 샘플러 설정
    config: SamplerConfig,
    /// 현재 상태
    state: SamplerState,
    /// 네트워크 탐색기
    discovery: Arc<D>,
    /// TCP 연결기
    connector: Arc<C>,
    /// 샘플 발행 채널
    sample_tx: Arc<watch::Sender<Option<NetworkSample>>>,
    /// 네트워크 정보 발행 채널
    info_tx: Arc<watch::Sender<NetworkInfo>>,
    /// 대기 중인 재초기화 요청
    reinit_pending: Arc<AtomicBool>,
    /// 워커 취소 토큰
    cancel: CancellationToken,
    /// 워커 태스크 핸들
    task: Option<JoinHandle<()>>,
    /// 완료된 사이클 수
    cycles: Arc<AtomicU64>,
    /// 적용된 재초기화 수
    reinitializations: Arc<AtomicU64>,
}

impl<D: NetworkDiscovery, C: TcpConnector> Sampler<D, C> {
    /// 공유 가능한 읽기 핸들을 반환합니다.
    pub fn handle(&self) -> SamplerHandle {
        SamplerHandle {
            sample_rx: self.sample_tx.subscribe(),
            info_rx: self.info_tx.subscribe(),
            reinit_pending: Arc::clone(&self.reinit_pending),
        }
    }

    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            SamplerState::Initialized => "initialized",
            SamplerState::Running => "running",
            SamplerState::Stopped => "stopped",
        }
    }

    /// 완료된 사이클 수를 반환합니다.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 적용된 재초기화 수를 반환합니다.
    pub fn reinitializations(&self) -> u64 {
        self.reinitializations.load(Ordering::Relaxed)
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn worker(&self) -> SamplerWorker<D, C> {
        SamplerWorker::new(
            self.config.clone(),
            Arc::clone(&self.discovery),
            Arc::clone(&self.connector),
            Arc::clone(&self.info_tx),
            Arc::clone(&self.reinit_pending),
            Arc::clone(&self.reinitializations),
        )
    }
}

impl<D: NetworkDiscovery, C: TcpConnector> Pipeline for Sampler<D, C> {
    async fn start(&mut self) -> Result<(), GotchiError> {
        if self.state == SamplerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting network sampler");

        let info = discover_environment(&*self.discovery).await;
        info!(
            gateway = ?info.gateway,
            interface = ?info.interface,
            ssid = %info.ssid,
            "network environment detected"
        );
        self.info_tx.send_replace(info);

        self.cancel = CancellationToken::new();
        let worker = self.worker();
        let cancel = self.cancel.clone();
        let sample_tx = Arc::clone(&self.sample_tx);
        let cycles = Arc::clone(&self.cycles);
        let period = self.config.sample_interval();

        self.task = Some(tokio::spawn(worker.run(sample_tx, cancel, cycles, period)));
        self.state = SamplerState::Running;
        info!(interval_ms = self.config.sample_interval_ms, "network sampler started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), GotchiError> {
        if self.state != SamplerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping network sampler");
        self.cancel.cancel();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout(), &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "sampler worker terminated abnormally"),
                Err(_) => {
                    warn!(
                        timeout_secs = self.config.shutdown_timeout_secs,
                        "sampler worker did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
        }

        self.state = SamplerState::Stopped;
        info!("network sampler stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            SamplerState::Running => match self.sample_tx.borrow().as_ref() {
                Some(sample) if !sample.connected => {
                    HealthStatus::Degraded("network disconnected".to_owned())
                }
                _ => HealthStatus::Healthy,
            },
            SamplerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            SamplerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 샘플러 읽기 핸들
///
/// 복제해서 여러 소비자에게 나눠줄 수 있습니다. 모든 읽기는 논블로킹이며 복사본을 반환합니다.
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    sample_rx: watch::Receiver<Option<NetworkSample>>,
    info_rx: watch::Receiver<NetworkInfo>,
    reinit_pending: Arc<AtomicBool>,
}

impl SamplerHandle {
    /// 가장 최근 샘플의 복사본을 반환합니다.
    ///
    /// 아직 발행된 샘플이 없으면 탐색된 게이트웨이/인터페이스를 담은 초기화 중 샘플을 반환합니다.
    pub fn get_current_sample(&self) -> NetworkSample {
        let published = self.sample_rx.borrow().clone();
        published.unwrap_or_else(|| NetworkSample::initializing(&self.info_rx.borrow()))
    }

    /// 가장 최근 네트워크 정보의 복사본을 반환합니다.
    pub fn get_network_info(&self) -> NetworkInfo {
        self.info_rx.borrow().clone()
    }

    /// 재초기화를 요청합니다.
    ///
    /// 워커의 다음 사이클 시작 시 적용됩니다. 여러 번 호출해도 한 번만 적용됩니다.
    pub fn reinitialize(&self) {
        if !self.reinit_pending.swap(true, Ordering::AcqRel) {
            debug!("sampler reinitialization requested");
        }
    }

    /// 샘플 변경 알림을 받는 수신자를 반환합니다.
    pub fn subscribe(&self) -> watch::Receiver<Option<NetworkSample>> {
        self.sample_rx.clone()
    }
}

/// 샘플러 워커 -- 히스토리를 소유하고 사이클을 실행합니다.
struct SamplerWorker<D: NetworkDiscovery, C: TcpConnector> {
    config: SamplerConfig,
    discovery: Arc<D>,
    connector: Arc<C>,
    info_tx: Arc<watch::Sender<NetworkInfo>>,
    reinit_pending: Arc<AtomicBool>,
    reinitializations: Arc<AtomicU64>,
    latency_window: RollingHistory<f64>,
    loss_window: RollingHistory<f64>,
    latency_baseline: RollingHistory<f64>,
    loss_baseline: RollingHistory<f64>,
    /// 손실률 측정 주기 계산용 사이클 번호
    cycle: u64,
    /// 마지막으로 측정한 손실률
    last_loss: f64,
}

impl<D: NetworkDiscovery, C: TcpConnector> SamplerWorker<D, C> {
    fn new(
        config: SamplerConfig,
        discovery: Arc<D>,
        connector: Arc<C>,
        info_tx: Arc<watch::Sender<NetworkInfo>>,
        reinit_pending: Arc<AtomicBool>,
        reinitializations: Arc<AtomicU64>,
    ) -> Self {
        Self {
            latency_window: RollingHistory::new(config.history_size),
            loss_window: RollingHistory::new(config.history_size),
            latency_baseline: RollingHistory::new(config.baseline_size),
            loss_baseline: RollingHistory::new(config.baseline_size),
            config,
            discovery,
            connector,
            info_tx,
            reinit_pending,
            reinitializations,
            cycle: 0,
            last_loss: 0.0,
        }
    }

    async fn run(
        mut self,
        sample_tx: Arc<watch::Sender<Option<NetworkSample>>>,
        cancel: CancellationToken,
        cycles: Arc<AtomicU64>,
        period: std::time::Duration,
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            // 측정 도중에도 취소에 응답
            let sample = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                sample = self.run_cycle() => sample,
            };

            record_sample_metrics(&sample);
            debug!(sample = %sample, "network sample published");
            sample_tx.send_replace(Some(sample));
            cycles.fetch_add(1, Ordering::Relaxed);
        }

        debug!("sampler worker exited");
    }

    /// 사이클 하나를 실행하고 발행할 샘플을 만듭니다.
    async fn run_cycle(&mut self) -> NetworkSample {
        if self.reinit_pending.swap(false, Ordering::AcqRel) {
            self.reinitialize().await;
        }

        let info = self.info_tx.borrow().clone();
        let gateway_known = info.gateway.is_some();
        let host = self.config.target_ip().or(info.gateway.map(IpAddr::V4));

        let connected = check_connectivity(
            &*self.connector,
            gateway_known,
            host,
            &self.config.connectivity_plan(),
            self.config.trust_gateway,
        )
        .await;

        let mut latency = UNKNOWN_LATENCY_MS;
        let mut loss = 100.0;

        if let Some(host) = host.filter(|_| connected) {
            latency = measure_latency(
                &*self.connector,
                host,
                &self.config.latency_plan(),
                gateway_known && self.config.trust_gateway,
            )
            .await;

            let every = u64::from(self.config.loss_every_n_cycles.max(1));
            if self.cycle % every == 0 {
                loss = measure_packet_loss(
                    &*self.connector,
                    host,
                    &self.config.loss_plan(),
                    self.config.loss_attempts,
                    self.config.loss_delay(),
                    connected,
                )
                .await;
                self.last_loss = loss;
                self.loss_window.push(loss);
            } else {
                loss = self.last_loss;
            }

            if latency >= 0.0 {
                self.latency_window.push(latency);
                self.latency_baseline.push(latency);
            }
            self.loss_baseline.push(loss);
        }

        self.cycle += 1;

        if info.connected != connected {
            info!(connected, ssid = %info.ssid, "connectivity changed");
        }
        self.info_tx.send_if_modified(|current| {
            if current.connected == connected {
                return false;
            }
            current.connected = connected;
            true
        });

        NetworkSample {
            timestamp: SystemTime::now(),
            connected,
            latency_ms: latency,
            packet_loss_pct: loss,
            avg_latency_ms: self.latency_window.mean(),
            avg_packet_loss_pct: self.loss_window.mean(),
            baseline_latency_ms: self.latency_baseline.median(),
            baseline_packet_loss_pct: self.loss_baseline.median(),
            gateway: info.gateway,
            interface: info.interface,
            ssid: info.ssid,
            local_ip: info.local_ip,
        }
    }

    /// 히스토리를 비우고 네트워크 환경을 다시 탐색합니다.
    async fn reinitialize(&mut self) {
        info!("reinitializing network sampler");

        self.latency_window.clear();
        self.loss_window.clear();
        self.latency_baseline.clear();
        self.loss_baseline.clear();
        self.cycle = 0;
        self.last_loss = 0.0;

        let info = discover_environment(&*self.discovery).await;
        info!(
            gateway = ?info.gateway,
            interface = ?info.interface,
            ssid = %info.ssid,
            "network environment re-detected"
        );
        self.info_tx.send_replace(info);

        self.reinitializations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SAMPLER_REINITIALIZATIONS_TOTAL).increment(1);
    }
}

fn record_sample_metrics(sample: &NetworkSample) {
    metrics::counter!(m::SAMPLER_CYCLES_TOTAL).increment(1);
    metrics::gauge!(m::SAMPLER_CONNECTED).set(if sample.connected { 1.0 } else { 0.0 });
    metrics::gauge!(m::SAMPLER_LATENCY_MS).set(sample.latency_ms);
    metrics::gauge!(m::SAMPLER_PACKET_LOSS_PCT).set(sample.packet_loss_pct);
    metrics::gauge!(m::SAMPLER_AVG_LATENCY_MS).set(sample.avg_latency_ms);
    metrics::gauge!(m::SAMPLER_BASELINE_LATENCY_MS).set(sample.baseline_latency_ms);
}

/// 샘플러 빌더
pub struct SamplerBuilder<D: NetworkDiscovery, C: TcpConnector> {
    config: SamplerConfig,
    discovery: Option<Arc<D>>,
    connector: Option<Arc<C>>,
}

impl<D: NetworkDiscovery, C: TcpConnector> SamplerBuilder<D, C> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: SamplerConfig::default(),
            discovery: None,
            connector: None,
        }
    }

    /// 샘플러 설정을 지정합니다.
    pub fn config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self
    }

    /// 네트워크 탐색기를 설정합니다.
    pub fn discovery(mut self, discovery: Arc<D>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// TCP 연결기를 설정합니다.
    pub fn connector(mut self, connector: Arc<C>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 샘플러를 빌드합니다.
    pub fn build(self) -> Result<Sampler<D, C>, NetmonError> {
        self.config.validate()?;

        let discovery = self.discovery.ok_or_else(|| NetmonError::Config {
            field: "discovery".to_owned(),
            reason: "network discovery provider must be provided".to_owned(),
        })?;
        let connector = self.connector.ok_or_else(|| NetmonError::Config {
            field: "connector".to_owned(),
            reason: "tcp connector must be provided".to_owned(),
        })?;

        let (sample_tx, _) = watch::channel(None);
        let (info_tx, _) = watch::channel(NetworkInfo::default());

        Ok(Sampler {
            config: self.config,
            state: SamplerState::Initialized,
            discovery,
            connector,
            sample_tx: Arc::new(sample_tx),
            info_tx: Arc::new(info_tx),
            reinit_pending: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            task: None,
            cycles: Arc::new(AtomicU64::new(0)),
            reinitializations: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl<D: NetworkDiscovery, C: TcpConnector> Default for SamplerBuilder<D, C> {
    fn default() -> Self {
        Self::new()
    }
}
