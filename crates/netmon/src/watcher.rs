//! 네트워크 변경 감시자
//!
//! [`ChangeWatcher`]는 주기적으로 [`NetworkFingerprint`]를 계산하고,
//! 이전 지문과 다르면 대상([`ReinitializeTarget`])에 재초기화를 한 번 요청합니다.
//!
//! - 첫 관측은 기준값만 설정합니다.
//! - 탐색이 실패한 주기는 건너뛰며 기준값을 바꾸지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gotchi_core::error::{GotchiError, PipelineError};
use gotchi_core::metrics as m;
use gotchi_core::pipeline::{HealthStatus, Pipeline};

use crate::config::WatcherConfig;
use crate::discovery::NetworkDiscovery;
use crate::error::NetmonError;
use crate::fingerprint::{NetworkFingerprint, current_fingerprint};
use crate::sampler::SamplerHandle;

/// 재초기화 요청을 받을 수 있는 대상
pub trait ReinitializeTarget: Send + Sync + 'static {
    /// 재초기화를 요청합니다. 블로킹하지 않아야 합니다.
    fn reinitialize(&self);
}

impl ReinitializeTarget for SamplerHandle {
    fn reinitialize(&self) {
        SamplerHandle::reinitialize(self);
    }
}

/// 지문 변화 추적기
#[derive(Debug, Default)]
pub struct FingerprintTracker {
    last: Option<NetworkFingerprint>,
}

impl FingerprintTracker {
    /// 빈 추적기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 지문을 관측합니다. 이전 지문과 다르면 `true`를 반환합니다.
    ///
    /// 첫 관측은 항상 `false`입니다.
    pub fn observe(&mut self, fingerprint: NetworkFingerprint) -> bool {
        match self.last.replace(fingerprint) {
            Some(previous) => self.last.as_ref() != Some(&previous),
            None => false,
        }
    }

    /// 마지막으로 관측한 지문
    pub fn last(&self) -> Option<&NetworkFingerprint> {
        self.last.as_ref()
    }
}

/// 감시자 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatcherState {
    Initialized,
    Running,
    Stopped,
}

/// 네트워크 변경 감시자
pub struct ChangeWatcher<D: NetworkDiscovery> {
    config: WatcherConfig,
    state: WatcherState,
    discovery: Arc<D>,
    target: Arc<dyn ReinitializeTarget>,
    /// 재시작해도 기준값을 유지
    tracker: Arc<Mutex<FingerprintTracker>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    changes: Arc<AtomicU64>,
}

impl<D: NetworkDiscovery> ChangeWatcher<D> {
    /// 새 감시자를 생성합니다.
    pub fn new(
        config: WatcherConfig,
        discovery: Arc<D>,
        target: Arc<dyn ReinitializeTarget>,
    ) -> Result<Self, NetmonError> {
        config.validate()?;
        Ok(Self {
            config,
            state: WatcherState::Initialized,
            discovery,
            target,
            tracker: Arc::new(Mutex::new(FingerprintTracker::new())),
            cancel: CancellationToken::new(),
            task: None,
            changes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// 감지된 네트워크 변경 횟수
    pub fn changes_detected(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    /// 주기 하나를 실행합니다. 변경을 감지해 재초기화를 요청했으면 `true`.
    pub async fn check_once(&self) -> bool {
        check_once(
            &*self.discovery,
            &*self.target,
            &self.tracker,
            &self.changes,
        )
        .await
    }
}

async fn check_once<D: NetworkDiscovery>(
    discovery: &D,
    target: &dyn ReinitializeTarget,
    tracker: &Mutex<FingerprintTracker>,
    changes: &AtomicU64,
) -> bool {
    let fingerprint = match current_fingerprint(discovery).await {
        Ok(fp) => fp,
        Err(e) => {
            warn!(error = %e, "network fingerprint unavailable, skipping check");
            return false;
        }
    };

    let mut tracker = tracker.lock().await;
    let previous = tracker.last().cloned();
    if !tracker.observe(fingerprint.clone()) {
        if previous.is_none() {
            debug!(fingerprint = %fingerprint, "network baseline recorded");
        }
        return false;
    }

    info!(
        previous = %previous.map(|p| p.to_string()).unwrap_or_default(),
        current = %fingerprint,
        "network change detected, requesting reinitialization"
    );
    changes.fetch_add(1, Ordering::Relaxed);
    metrics::counter!(m::WATCHER_CHANGES_TOTAL).increment(1);
    target.reinitialize();
    true
}

impl<D: NetworkDiscovery> Pipeline for ChangeWatcher<D> {
    async fn start(&mut self) -> Result<(), GotchiError> {
        if self.state == WatcherState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting network change watcher");

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let discovery = Arc::clone(&self.discovery);
        let target = Arc::clone(&self.target);
        let tracker = Arc::clone(&self.tracker);
        let changes = Arc::clone(&self.changes);
        let period = self.config.watch_interval();

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = check_once(&*discovery, &*target, &tracker, &changes) => {}
                }
            }

            debug!("change watcher exited");
        }));

        self.state = WatcherState::Running;
        info!(
            interval_secs = self.config.watch_interval_secs,
            "network change watcher started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), GotchiError> {
        if self.state != WatcherState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping network change watcher");
        self.cancel.cancel();

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(self.config.shutdown_timeout(), &mut task)
                .await
                .is_err()
            {
                warn!("change watcher did not stop in time, aborting");
                task.abort();
            }
        }

        self.state = WatcherState::Stopped;
        info!("network change watcher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            WatcherState::Running => HealthStatus::Healthy,
            WatcherState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            WatcherState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
