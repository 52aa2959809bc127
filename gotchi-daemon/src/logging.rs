//! Logging initialization for gotchi-daemon.
//!
//! Resolves the effective filter and format from `RUST_LOG`, the CLI
//! overrides and the `[general]` section, then installs a
//! `tracing-subscriber` registry.
//!
//! # Precedence
//!
//! 1. `RUST_LOG` (full `EnvFilter` directives)
//! 2. `--log-level`
//! 3. `general.log_level`
//!
//! `--log-format` likewise wins over `general.log_format`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gotchi_core::config::GeneralConfig;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Machine-parseable JSON lines
    Json,
    /// Human-readable colored output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Pretty => write!(f, "pretty"),
        }
    }
}

/// Command-line overrides for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOverrides<'a> {
    /// `--log-level`
    pub level: Option<&'a str>,
    /// `--log-format`
    pub format: Option<&'a str>,
}

/// Effective logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl LogSettings {
    /// Resolve settings from the environment value of `RUST_LOG`, the CLI
    /// overrides and the config file.
    pub fn resolve(
        config: &GeneralConfig,
        overrides: LogOverrides<'_>,
        rust_log: Option<&str>,
    ) -> Result<Self> {
        let format = overrides
            .format
            .unwrap_or(&config.log_format)
            .parse::<LogFormat>()?;

        if let Some(level) = overrides.level {
            if !VALID_LEVELS.contains(&level) {
                return Err(anyhow::anyhow!(
                    "unknown log level '{}', expected one of: {}",
                    level,
                    VALID_LEVELS.join(", ")
                ));
            }
        }

        let filter = rust_log
            .map(str::trim)
            .filter(|directives| !directives.is_empty())
            .or(overrides.level)
            .unwrap_or(&config.log_level)
            .to_owned();

        Ok(Self { filter, format })
    }

    /// Build the `EnvFilter` for these settings.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .with_context(|| format!("invalid log filter '{}'", self.filter))
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
pub fn init_tracing(config: &GeneralConfig, overrides: LogOverrides<'_>) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let settings = LogSettings::resolve(config, overrides, rust_log.as_deref())?;
    let env_filter = settings.env_filter()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match settings.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| {
        anyhow::anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            settings.format,
            e
        )
    })?;

    tracing::debug!(filter = %settings.filter, format = %settings.format, "tracing initialized");
    Ok(())
}
