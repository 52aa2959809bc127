//! CLI argument definitions for gotchi-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Gotchi network health daemon.
///
/// Samples latency and packet loss, watches for network changes,
/// classifies the network state and checks remote peers against
/// reputation services.
#[derive(Parser, Debug)]
#[command(name = "gotchi-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to gotchi.toml configuration file.
    #[arg(short, long, default_value = "/etc/gotchi/gotchi.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file. `RUST_LOG` still wins.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}
