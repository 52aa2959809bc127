//! Module orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `gotchi-daemon`.
//! It validates configuration, builds enabled modules, manages
//! startup/shutdown ordering, and waits for a shutdown signal.
//!
//! # Startup Order
//!
//! 1. Sampler (publishes `NetworkSample`)
//! 2. Change Watcher (requests sampler reinitialization)
//! 3. Analysis loop (consumes samples)
//! 4. Threat scan loop (independent of the sampler)
//!
//! # Shutdown Order
//!
//! Reverse of startup, so consumers stop before the sampler they read from.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;

use gotchi_core::config::GotchiConfig;
use gotchi_netmon::SamplerHandle;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{ModuleRegistry, analysis, monitor, threat_scan};

/// Seconds between uptime metric updates.
const UPTIME_UPDATE_INTERVAL_SECS: u64 = 10;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: GotchiConfig,
    /// Registry of all modules (ordered for start/stop).
    modules: ModuleRegistry,
    /// Read handle of the sampler, when the monitor is enabled.
    sampler: Option<SamplerHandle>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled module fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = GotchiConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: GotchiConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let mut modules = ModuleRegistry::new();
        let mut sampler = None;

        if let Some(monitor) = monitor::init(&config)? {
            modules.register(monitor.sampler);
            modules.register(monitor.watcher);
            sampler = Some(monitor.handle);
        }

        if let Some(handle) = analysis::init(&config, sampler.as_ref())? {
            modules.register(handle);
        }

        if let Some(handle) = threat_scan::init(&config)? {
            modules.register(handle);
        }

        tracing::info!(
            total_modules = modules.count(),
            modules = ?modules.names(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(modules.count());
        }

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            modules,
            sampler,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all enabled modules and wait for a shutdown signal.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        let pid_file = self.pid_file_path();
        if let Some(path) = pid_file.as_deref() {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start().await {
            if let Some(path) = pid_file.as_deref() {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let mut uptime_updater_task = if self.config.metrics.enabled {
            Some(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ))
        } else {
            None
        };

        tracing::info!("gotchi-daemon running");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_updater_task.take() {
            let _ = task.await;
        }

        let result = self.shutdown().await;

        if let Some(path) = pid_file.as_deref() {
            remove_pid_file(path);
        }

        result
    }

    /// Start all enabled modules in registration order.
    ///
    /// On failure the modules that already started are stopped again.
    pub async fn start(&mut self) -> Result<()> {
        if self.modules.is_started() {
            return Err(anyhow::anyhow!("modules are already started"));
        }

        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stop all modules in reverse registration order.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all modules");
        self.modules.stop_all().await
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .modules
            .health_statuses()
            .await
            .into_iter()
            .map(|(name, enabled, status)| ModuleHealth {
                name,
                enabled,
                status,
            })
            .collect();

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(gotchi_core::metrics::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs,
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &GotchiConfig {
        &self.config
    }

    /// Read handle of the sampler, if the monitor is enabled.
    pub fn sampler(&self) -> Option<&SamplerHandle> {
        self.sampler.as_ref()
    }

    /// Registered module names in start order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.names()
    }

    fn pid_file_path(&self) -> Option<std::path::PathBuf> {
        let pid_file = self.config.general.pid_file.trim();
        (!pid_file.is_empty()).then(|| std::path::PathBuf::from(pid_file))
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file
/// - Creates parent directory with restrictive permissions (0o700)
///
/// # Errors
///
/// Returns an error if the PID file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record daemon-level metrics (build info, modules registered).
fn record_daemon_metrics(module_count: usize) {
    use gotchi_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_MODULES_REGISTERED).set(module_count as f64);
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use gotchi_core::metrics as m;

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(UPTIME_UPDATE_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path with non-existent parent directory
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("subdir").join("gotchi.pid");

        // When: Writing PID file
        write_pid_file(&pid_file).unwrap();

        // Then: Should contain the current PID
        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("gotchi.pid");
        fs::write(&pid_file, "12345").unwrap();

        // When: Attempting to write PID file again
        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        // Then: Should fail and mention the existing PID
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
    }

    #[test]
    fn test_remove_pid_file_handles_nonexistent_gracefully() {
        let temp_dir = tempfile::tempdir().unwrap();
        remove_pid_file(&temp_dir.path().join("missing.pid"));
    }

    #[tokio::test]
    async fn test_spawn_uptime_updater_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(tokio::time::Duration::from_millis(100), task).await;
        assert!(result.is_ok(), "uptime updater should shut down promptly");
    }
}
