//! Analysis loop -- periodic classification of the latest sample.
//!
//! Every `classifier.interval_secs` the loop reads the sampler's latest
//! [`NetworkSample`], classifies it, records classifier metrics and logs
//! state and attack transitions. The latest verdict is published on a
//! `watch` channel for presentation layers.

use std::sync::Arc;
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
use gotchi_core::types::{AttackType, AttackVerdict, NetworkSample, ThreatState};
use gotchi_detector::{Classifier, DetectorConfig};
use gotchi_netmon::SamplerHandle;

use super::{LOOP_SHUTDOWN_TIMEOUT, ModuleHandle};

/// Initialize the analysis loop.
///
/// Requires the sampler handle; returns `None` when the monitor is disabled.
pub fn init(config: &GotchiConfig, sampler: Option<&SamplerHandle>) -> Result<Option<ModuleHandle>> {
    let Some(sampler) = sampler else {
        tracing::info!("analysis loop disabled (network monitor is off)");
        return Ok(None);
    };

    let detector_config = DetectorConfig::from_core(&config.classifier)
        .map_err(|e| anyhow::anyhow!("invalid classifier config: {}", e))?;
    let classifier = Classifier::new(&detector_config)
        .map_err(|e| anyhow::anyhow!("failed to build classifier: {}", e))?;

    let analysis = AnalysisLoop::new(
        Arc::new(classifier),
        sampler.subscribe(),
        Duration::from_secs(config.classifier.interval_secs.max(1)),
    );
    Ok(Some(ModuleHandle::new("analysis", true, Box::new(analysis))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Initialized,
    Running,
    Stopped,
}

/// Periodic classifier driver.
pub struct AnalysisLoop {
    classifier: Arc<Classifier>,
    samples: watch::Receiver<Option<NetworkSample>>,
    verdict_tx: Arc<watch::Sender<Option<AttackVerdict>>>,
    interval: Duration,
    state: LoopState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AnalysisLoop {
    /// Create a loop reading from `samples`.
    pub fn new(
        classifier: Arc<Classifier>,
        samples: watch::Receiver<Option<NetworkSample>>,
        interval: Duration,
    ) -> Self {
        let (verdict_tx, _) = watch::channel(None);
        Self {
            classifier,
            samples,
            verdict_tx: Arc::new(verdict_tx),
            interval,
            state: LoopState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Subscribe to classification results.
    pub fn verdicts(&self) -> watch::Receiver<Option<AttackVerdict>> {
        self.verdict_tx.subscribe()
    }

    /// The most recent verdict, if any sample has been classified.
    pub fn latest_verdict(&self) -> Option<AttackVerdict> {
        self.verdict_tx.borrow().clone()
    }
}

impl Pipeline for AnalysisLoop {
    async fn start(&mut self) -> Result<(), GotchiError> {
        if self.state == LoopState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        self.cancel = CancellationToken::new();
        let worker = AnalysisWorker {
            classifier: Arc::clone(&self.classifier),
            samples: self.samples.clone(),
            verdict_tx: Arc::clone(&self.verdict_tx),
            transitions: TransitionTracker::default(),
        };
        self.task = Some(tokio::spawn(worker.run(self.cancel.clone(), self.interval)));
        self.state = LoopState::Running;
        info!(interval_secs = self.interval.as_secs(), "analysis loop started");
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
                warn!("analysis loop did not stop in time, aborting");
                task.abort();
            }
        }

        self.state = LoopState::Stopped;
        info!("analysis loop stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            LoopState::Running => HealthStatus::Healthy,
            LoopState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            LoopState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

struct AnalysisWorker {
    classifier: Arc<Classifier>,
    samples: watch::Receiver<Option<NetworkSample>>,
    verdict_tx: Arc<watch::Sender<Option<AttackVerdict>>>,
    transitions: TransitionTracker,
}

impl AnalysisWorker {
    async fn run(mut self, cancel: CancellationToken, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.analyze_once();
        }
        debug!("analysis worker exiting");
    }

    fn analyze_once(&mut self) {
        let Some(sample) = self.samples.borrow().clone() else {
            debug!("no sample published yet");
            return;
        };

        let verdict = self.classifier.classify(&sample);
        record_verdict_metrics(&verdict);

        match self.transitions.observe(&verdict) {
            Transition::None => {}
            Transition::State { from, to } => {
                info!(
                    from = ?from,
                    to = %to,
                    anomaly_score = verdict.anomaly_score,
                    confidence = verdict.confidence,
                    "network state changed"
                );
            }
        }
        if let Some(attack) = self.transitions.take_new_attack() {
            metrics::counter!(m::CLASSIFIER_ATTACKS_TOTAL, m::LABEL_ATTACK_TYPE => attack.label())
                .increment(1);
            warn!(
                attack_type = %attack,
                latency_ms = sample.latency_ms,
                loss_pct = sample.packet_loss_pct,
                "attack pattern detected"
            );
        }

        self.verdict_tx.send_replace(Some(verdict));
    }
}

fn record_verdict_metrics(verdict: &AttackVerdict) {
    metrics::gauge!(m::CLASSIFIER_ANOMALY_SCORE).set(verdict.anomaly_score);
    metrics::gauge!(m::CLASSIFIER_CONFIDENCE).set(f64::from(verdict.confidence));
    metrics::gauge!(m::CLASSIFIER_STATE).set(verdict.state.as_gauge());
}

#[derive(Debug, PartialEq, Eq)]
enum Transition {
    None,
    State {
        from: Option<ThreatState>,
        to: ThreatState,
    },
}

/// Remembers the previous verdict so that only changes are logged.
#[derive(Debug, Default)]
struct TransitionTracker {
    state: Option<ThreatState>,
    attack: Option<AttackType>,
    new_attack: Option<AttackType>,
}

impl TransitionTracker {
    fn observe(&mut self, verdict: &AttackVerdict) -> Transition {
        if verdict.attack_type != self.attack {
            self.new_attack = verdict.attack_type;
            self.attack = verdict.attack_type;
        }

        if self.state == Some(verdict.state) {
            return Transition::None;
        }
        let from = self.state.replace(verdict.state);
        Transition::State {
            from,
            to: verdict.state,
        }
    }

    fn take_new_attack(&mut self) -> Option<AttackType> {
        self.new_attack.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotchi_core::types::NetworkInfo;

    fn sample(latency: f64, loss: f64) -> NetworkSample {
        NetworkSample {
            connected: true,
            latency_ms: latency,
            packet_loss_pct: loss,
            avg_latency_ms: latency,
            avg_packet_loss_pct: loss,
            baseline_latency_ms: 5.0,
            ..NetworkSample::initializing(&NetworkInfo::default())
        }
    }

    fn verdict(state: ThreatState, attack: Option<AttackType>) -> AttackVerdict {
        AttackVerdict {
            attack_type: attack,
            attack_detected: attack.is_some(),
            ..AttackVerdict::neutral(state)
        }
    }

    #[test]
    fn tracker_reports_only_changes() {
        let mut tracker = TransitionTracker::default();

        assert_eq!(
            tracker.observe(&verdict(ThreatState::Happy, None)),
            Transition::State {
                from: None,
                to: ThreatState::Happy
            }
        );
        assert_eq!(
            tracker.observe(&verdict(ThreatState::Happy, None)),
            Transition::None
        );
        assert_eq!(
            tracker.observe(&verdict(ThreatState::Stressed, Some(AttackType::UdpFlood))),
            Transition::State {
                from: Some(ThreatState::Happy),
                to: ThreatState::Stressed
            }
        );
        assert_eq!(tracker.take_new_attack(), Some(AttackType::UdpFlood));

        // A continuing attack is not reported again
        tracker.observe(&verdict(ThreatState::Stressed, Some(AttackType::UdpFlood)));
        assert_eq!(tracker.take_new_attack(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_until_first_sample_then_classifies() {
        let (sample_tx, sample_rx) = watch::channel(None);
        let mut analysis = AnalysisLoop::new(
            Arc::new(Classifier::default()),
            sample_rx,
            Duration::from_secs(2),
        );

        analysis.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(analysis.latest_verdict().is_none());

        sample_tx.send_replace(Some(sample(350.0, 35.0)));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let verdict = analysis.latest_verdict().unwrap();
        assert_eq!(verdict.state, ThreatState::Stressed);
        assert_eq!(verdict.attack_type, Some(AttackType::UdpFlood));

        analysis.stop().await.unwrap();
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let (_tx, rx) = watch::channel(None);
        let mut analysis =
            AnalysisLoop::new(Arc::new(Classifier::default()), rx, Duration::from_secs(1));

        assert!(analysis.health_check().await.is_unhealthy());
        assert!(analysis.stop().await.is_err());

        analysis.start().await.unwrap();
        assert!(analysis.start().await.is_err());
        assert!(analysis.health_check().await.is_healthy());

        analysis.stop().await.unwrap();
        assert!(analysis.health_check().await.is_unhealthy());
    }
}
