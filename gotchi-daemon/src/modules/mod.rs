//! Module registry and initialization.
//!
//! Each gotchi worker is wrapped as a [`ModuleHandle`] that provides
//! uniform lifecycle management via the [`DynPipeline`] trait.
//!
//! The [`ModuleRegistry`] tracks all registered modules and supports
//! ordered start/stop operations.

pub mod analysis;
pub mod monitor;
pub mod threat_scan;

use std::time::Duration;

use gotchi_core::pipeline::{DynPipeline, HealthStatus};

/// Bounded wait for daemon-owned loops to finish after cancellation.
pub(crate) const LOOP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle to a registered module.
///
/// Wraps a `Box<dyn DynPipeline>` with metadata (name, enabled flag).
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// Whether this module is enabled in configuration.
    pub enabled: bool,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
}

impl ModuleHandle {
    /// Create a new module handle.
    pub fn new(name: impl Into<String>, enabled: bool, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
        }
    }

    /// Check the module's health status.
    ///
    /// Disabled modules always report `Healthy` (they are not expected to run).
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Registry of all gotchi modules.
///
/// Provides ordered start/stop and health check aggregation.
pub struct ModuleRegistry {
    /// Modules in registration order (sampler first, consumers after).
    modules: Vec<ModuleHandle>,
    /// Number of modules started by the last `start_all` call.
    started: usize,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            started: 0,
        }
    }

    /// Register a module.
    ///
    /// Modules should be registered in dependency order:
    /// producers first, consumers last.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all enabled modules in registration order.
    ///
    /// Returns an error on the first module that fails to start.
    /// Already-started modules are NOT rolled back; the caller should
    /// invoke `stop_all` if partial startup is unacceptable.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        if self.is_started() {
            return Err(anyhow::anyhow!("modules are already started"));
        }
        for handle in &mut self.modules {
            if handle.enabled {
                tracing::info!(module = %handle.name, "starting module");
                handle.pipeline.start().await.map_err(|e| {
                    anyhow::anyhow!("failed to start module '{}': {}", handle.name, e)
                })?;
                tracing::info!(module = %handle.name, "module started successfully");
            } else {
                tracing::debug!(module = %handle.name, "skipping disabled module");
            }
            self.started += 1;
        }
        Ok(())
    }

    /// Stop started modules in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining modules, so consumers
    /// stop before the sampler they read from.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        let started = self.started;

        for handle in self.modules.iter_mut().take(started).rev() {
            if !handle.enabled {
                continue;
            }

            tracing::info!(module = %handle.name, "stopping module");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(
                    module = %handle.name,
                    error = %e,
                    "failed to stop module"
                );
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "module stopped successfully");
            }
        }
        self.started = 0;

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Whether modules from a previous `start_all` are still running.
    pub fn is_started(&self) -> bool {
        self.started > 0
    }

    /// Get health status for all modules.
    pub async fn health_statuses(&self) -> Vec<(String, bool, HealthStatus)> {
        let mut statuses = Vec::new();
        for handle in &self.modules {
            let status = handle.health_check().await;
            statuses.push((handle.name.clone(), handle.enabled, status));
        }
        statuses
    }

    /// Registered module names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Number of enabled modules.
    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use gotchi_core::error::{GotchiError, PipelineError};
    use gotchi_core::pipeline::Pipeline;

    /// Records start/stop calls into a shared journal.
    struct Recorder {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        running: bool,
    }

    impl Pipeline for Recorder {
        async fn start(&mut self) -> Result<(), GotchiError> {
            if self.fail_start {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            self.journal.lock().unwrap().push(format!("start {}", self.name));
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), GotchiError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            self.journal.lock().unwrap().push(format!("stop {}", self.name));
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    fn recorder(
        name: &'static str,
        journal: &Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    ) -> ModuleHandle {
        ModuleHandle::new(
            name,
            true,
            Box::new(Recorder {
                name,
                journal: Arc::clone(journal),
                fail_start,
                running: false,
            }),
        )
    }

    #[tokio::test]
    async fn starts_in_order_and_stops_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(recorder("sampler", &journal, false));
        registry.register(recorder("watcher", &journal, false));
        registry.register(recorder("analysis", &journal, false));

        registry.start_all().await.unwrap();
        registry.stop_all().await.unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "start sampler",
                "start watcher",
                "start analysis",
                "stop analysis",
                "stop watcher",
                "stop sampler",
            ]
        );
    }

    #[tokio::test]
    async fn rollback_stops_only_started_modules() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(recorder("sampler", &journal, false));
        registry.register(recorder("watcher", &journal, true));
        registry.register(recorder("analysis", &journal, false));

        let err = registry.start_all().await.unwrap_err();
        assert!(err.to_string().contains("watcher"));

        registry.stop_all().await.unwrap();
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["start sampler", "stop sampler"]
        );
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_touching_modules() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(recorder("sampler", &journal, false));

        registry.start_all().await.unwrap();
        assert!(registry.start_all().await.is_err());
        assert!(registry.is_started());

        registry.stop_all().await.unwrap();
        assert!(!registry.is_started());
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["start sampler", "stop sampler"]
        );
    }

    #[tokio::test]
    async fn disabled_module_is_skipped_and_healthy() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        let mut handle = recorder("threat-scan", &journal, false);
        handle.enabled = false;
        registry.register(handle);

        registry.start_all().await.unwrap();
        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(registry.enabled_count(), 0);

        let statuses = registry.health_statuses().await;
        assert_eq!(statuses[0].2, HealthStatus::Healthy);
        registry.stop_all().await.unwrap();
    }
}
