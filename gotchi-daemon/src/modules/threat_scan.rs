//! Threat scan loop -- connection survey and reputation checks.
//!
//! Every `threat_intel.scan_interval_secs` the loop lists established
//! connections, surveys them for surges, and checks at most
//! `max_new_checks_per_scan` public remote IPs that have not been checked
//! yet against the [`ReputationAggregator`].
//!
//! ```text
//! ConnectionLister --Vec<Connection>--> ConnectionSurvey --surges--> warn! + metrics
//!                                            │
//!                                  unique IPs (unchecked, public)
//!                                            │
//!                                            ▼
//!                                 ReputationAggregator::check_ip
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gotchi_core::config::GotchiConfig;
use gotchi_core::error::{GotchiError, PipelineError};
use gotchi_core::metrics as m;
use gotchi_core::pipeline::{HealthStatus, Pipeline};
use gotchi_detector::{ConnectionSurvey, SurveyConfig, SurveyLevel, new_surge_ips};
use gotchi_netmon::{ConnectionLister, ProcNetLister};
use gotchi_threat_intel::{IntelConfig, RecentIps, ReputationAggregator, is_public};

use super::{LOOP_SHUTDOWN_TIMEOUT, ModuleHandle};

/// Remembered IPs before the oldest batch is forgotten.
const CHECKED_CAPACITY: usize = 500;
const CHECKED_EVICT_BATCH: usize = 100;

/// Initialize the threat scan loop with the procfs connection lister.
///
/// Returns `None` if threat intelligence is disabled in configuration.
pub fn init(config: &GotchiConfig) -> Result<Option<ModuleHandle>> {
    if !config.threat_intel.enabled {
        tracing::info!("threat intelligence disabled in configuration");
        return Ok(None);
    }

    let intel_config = IntelConfig::from_core(&config.threat_intel);
    let aggregator = ReputationAggregator::new(&intel_config)
        .map_err(|e| anyhow::anyhow!("failed to build reputation aggregator: {}", e))?;
    if !aggregator.has_sources() {
        tracing::warn!("threat intelligence enabled but no reputation sources configured");
    }

    init_with(
        config,
        Arc::new(ProcNetLister::new()),
        Arc::new(aggregator),
    )
    .map(Some)
}

/// Build the threat scan module with the given lister and aggregator.
pub fn init_with<L: ConnectionLister>(
    config: &GotchiConfig,
    lister: Arc<L>,
    aggregator: Arc<ReputationAggregator>,
) -> Result<ModuleHandle> {
    let intel_config = IntelConfig::from_core(&config.threat_intel);
    intel_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid threat intel config: {}", e))?;
    let survey_config = SurveyConfig::from_core(&config.threat_intel);
    survey_config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid connection survey config: {}", e))?;

    let scan = ThreatScanLoop::new(
        lister,
        aggregator,
        survey_config,
        intel_config.scan_interval(),
        intel_config.max_new_checks_per_scan,
    );
    Ok(ModuleHandle::new("threat-scan", true, Box::new(scan)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Initialized,
    Running,
    Stopped,
}

/// Periodic connection survey and reputation scan.
pub struct ThreatScanLoop<L: ConnectionLister> {
    lister: Arc<L>,
    aggregator: Arc<ReputationAggregator>,
    survey_config: SurveyConfig,
    interval: Duration,
    max_new_checks: usize,
    state: LoopState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    survey_tx: Arc<watch::Sender<ConnectionSurvey>>,
    listing_failed: Arc<AtomicBool>,
    scans: Arc<AtomicU64>,
}

impl<L: ConnectionLister> ThreatScanLoop<L> {
    /// Create a new scan loop.
    pub fn new(
        lister: Arc<L>,
        aggregator: Arc<ReputationAggregator>,
        survey_config: SurveyConfig,
        interval: Duration,
        max_new_checks: usize,
    ) -> Self {
        let (survey_tx, _) = watch::channel(ConnectionSurvey::default());
        Self {
            lister,
            aggregator,
            survey_config,
            interval,
            max_new_checks,
            state: LoopState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
            survey_tx: Arc::new(survey_tx),
            listing_failed: Arc::new(AtomicBool::new(false)),
            scans: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The most recent connection survey.
    pub fn latest_survey(&self) -> ConnectionSurvey {
        self.survey_tx.borrow().clone()
    }

    /// Completed scan count.
    pub fn scans_completed(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Shared aggregator (for statistics).
    pub fn aggregator(&self) -> &Arc<ReputationAggregator> {
        &self.aggregator
    }
}

impl<L: ConnectionLister> Pipeline for ThreatScanLoop<L> {
    async fn start(&mut self) -> Result<(), GotchiError> {
        if self.state == LoopState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        self.cancel = CancellationToken::new();
        let worker = ScanWorker {
            lister: Arc::clone(&self.lister),
            aggregator: Arc::clone(&self.aggregator),
            survey_config: self.survey_config,
            max_new_checks: self.max_new_checks,
            survey_tx: Arc::clone(&self.survey_tx),
            listing_failed: Arc::clone(&self.listing_failed),
            checked: RecentIps::new(CHECKED_CAPACITY, CHECKED_EVICT_BATCH),
            previous: ConnectionSurvey::default(),
        };
        self.task = Some(tokio::spawn(worker.run(
            self.cancel.clone(),
            Arc::clone(&self.scans),
            self.interval,
        )));
        self.state = LoopState::Running;
        info!(
            interval_secs = self.interval.as_secs(),
            max_new_checks = self.max_new_checks,
            "threat scan loop started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), GotchiError> {
        if self.state != LoopState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(LOOP_SHUTDOWN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                warn!("threat scan loop did not stop in time, aborting");
                task.abort();
            }
        }

        let stats = self.aggregator.get_statistics();
        self.state = LoopState::Stopped;
        info!(
            total_checks = stats.total_checks,
            cache_hit_rate = stats.cache_hit_rate,
            malicious_ips = stats.malicious_ips_found,
            "threat scan loop stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            LoopState::Running if self.listing_failed.load(Ordering::Relaxed) => {
                HealthStatus::Degraded("connection listing unavailable".to_owned())
            }
            LoopState::Running => HealthStatus::Healthy,
            LoopState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            LoopState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

struct ScanWorker<L: ConnectionLister> {
    lister: Arc<L>,
    aggregator: Arc<ReputationAggregator>,
    survey_config: SurveyConfig,
    max_new_checks: usize,
    survey_tx: Arc<watch::Sender<ConnectionSurvey>>,
    listing_failed: Arc<AtomicBool>,
    /// IPs already sent to the aggregator
    checked: RecentIps,
    previous: ConnectionSurvey,
}

impl<L: ConnectionLister> ScanWorker<L> {
    async fn run(mut self, cancel: CancellationToken, scans: Arc<AtomicU64>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.scan_once() => {
                    scans.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        debug!(checked = self.checked.len(), "threat scan worker exiting");
    }

    async fn scan_once(&mut self) {
        let connections = match self.lister.list_established().await {
            Ok(connections) => {
                self.listing_failed.store(false, Ordering::Relaxed);
                connections
            }
            Err(e) => {
                if !self.listing_failed.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "failed to list connections");
                }
                return;
            }
        };

        let survey = ConnectionSurvey::analyze(&connections, &self.survey_config);
        metrics::gauge!(m::THREAT_INTEL_CONNECTIONS).set(survey.total_connections as f64);

        for ip in new_surge_ips(&self.previous, &survey) {
            let count = survey.per_ip.get(&ip).copied().unwrap_or_default();
            metrics::counter!(m::THREAT_INTEL_CONNECTION_SURGES_TOTAL).increment(1);
            warn!(ip = %ip, connections = count, "connection surge from single address");
        }
        if survey.level != self.previous.level {
            match survey.level {
                SurveyLevel::Normal => info!(total = survey.total_connections, "connection level normal"),
                level => warn!(
                    level = %level,
                    total = survey.total_connections,
                    unique_ips = survey.per_ip.len(),
                    "connection level changed"
                ),
            }
        }

        let candidates: Vec<IpAddr> = survey
            .per_ip
            .keys()
            .copied()
            .filter(|ip| is_public(*ip) && !self.checked.contains(ip))
            .take(self.max_new_checks)
            .collect();

        for ip in candidates {
            let record = self.aggregator.check_ip(ip).await;
            debug!(ip = %ip, level = %record.threat_level, cached = record.cached, "ip scanned");
            self.checked.insert(ip);
        }

        self.survey_tx.send_replace(survey.clone());
        self.previous = survey;
    }
}
