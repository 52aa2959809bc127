//! Network monitor module initialization.
//!
//! Builds the [`Sampler`](gotchi_netmon::Sampler) and the
//! [`ChangeWatcher`](gotchi_netmon::ChangeWatcher) from `[monitor]` and
//! wires the watcher to the sampler's handle.
//!
//! # Wiring
//!
//! ```text
//! ChangeWatcher --reinitialize()--> SamplerHandle --> Sampler worker
//! Sampler worker --watch<NetworkSample>--> SamplerHandle --> analysis loop
//! ```

use std::sync::Arc;

use anyhow::Result;

use gotchi_core::config::GotchiConfig;
use gotchi_netmon::{
    ChangeWatcher, NetworkDiscovery, SamplerBuilder, SamplerConfig, SamplerHandle,
    SystemDiscovery, TcpConnector, TokioConnector, WatcherConfig,
};

use super::ModuleHandle;

/// Modules produced by [`init`].
pub struct MonitorModules {
    /// The sampler pipeline.
    pub sampler: ModuleHandle,
    /// The change watcher pipeline.
    pub watcher: ModuleHandle,
    /// Read handle shared with consumers.
    pub handle: SamplerHandle,
}

/// Initialize the monitor modules with system discovery and real TCP probes.
///
/// Returns `None` if the monitor is disabled in configuration.
pub fn init(config: &GotchiConfig) -> Result<Option<MonitorModules>> {
    init_with(
        config,
        Arc::new(SystemDiscovery::new()),
        Arc::new(TokioConnector),
    )
}

/// Initialize the monitor modules with the given discovery and connector.
pub fn init_with<D, C>(
    config: &GotchiConfig,
    discovery: Arc<D>,
    connector: Arc<C>,
) -> Result<Option<MonitorModules>>
where
    D: NetworkDiscovery,
    C: TcpConnector,
{
    if !config.monitor.enabled {
        tracing::info!("network monitor disabled in configuration");
        return Ok(None);
    }

    tracing::info!("initializing network monitor");

    let sampler_config = SamplerConfig::from_core(&config.monitor);
    let watcher_config = WatcherConfig::from_core(&config.monitor);

    let sampler = SamplerBuilder::new()
        .config(sampler_config)
        .discovery(Arc::clone(&discovery))
        .connector(connector)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build sampler: {}", e))?;
    let handle = sampler.handle();

    let watcher = ChangeWatcher::new(watcher_config, discovery, Arc::new(handle.clone()))
        .map_err(|e| anyhow::anyhow!("failed to build change watcher: {}", e))?;

    Ok(Some(MonitorModules {
        sampler: ModuleHandle::new("sampler", true, Box::new(sampler)),
        watcher: ModuleHandle::new("change-watcher", true, Box::new(watcher)),
        handle,
    }))
}
