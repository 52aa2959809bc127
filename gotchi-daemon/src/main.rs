//! gotchi-daemon entry point.
//!
//! Loading order: TOML file, `GOTCHI_*` environment overrides, `--pid-file`,
//! then validation. Log level and format overrides are resolved by
//! [`init_tracing`] together with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;

use gotchi_core::config::GotchiConfig;
use gotchi_daemon::cli::DaemonCli;
use gotchi_daemon::logging::{LogOverrides, LogSettings, init_tracing};
use gotchi_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = GotchiConfig::from_file(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    config.apply_env_overrides();

    if let Some(pid_file) = cli.pid_file.clone() {
        config.general.pid_file = pid_file;
    }

    config.validate().context("configuration is invalid")?;

    let log_overrides = LogOverrides {
        level: cli.log_level.as_deref(),
        format: cli.log_format.as_deref(),
    };

    if cli.validate {
        LogSettings::resolve(&config.general, log_overrides, None)
            .context("logging options are invalid")?;
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general, log_overrides)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "gotchi-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("gotchi-daemon shut down");
    Ok(())
}
