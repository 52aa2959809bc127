#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`NetmonError`)
//! - [`config`]: Sampler/watcher configuration (`SamplerConfig`, `WatcherConfig`)
//! - [`probe`]: TCP connect probes (`TcpConnector` trait, `TokioConnector`)
//! - [`discovery`]: Network environment discovery (`NetworkDiscovery` trait, `SystemDiscovery`)
//! - [`fingerprint`]: Network identity hash (`NetworkFingerprint`)
//! - [`connections`]: Active connection listing (`ConnectionLister` trait, `ProcNetLister`)
//! - [`sampler`]: Periodic quality sampler (`Sampler`, `SamplerHandle`, `SamplerBuilder`)
//! - [`watcher`]: Network change watcher (`ChangeWatcher`, `ReinitializeTarget`)
//!
//! # Architecture
//!
//! ```text
//! ChangeWatcher --fingerprint changed--> SamplerHandle::reinitialize()
//!                                              |
//! Sampler worker --probe--> gateway / target_host
//!       |
//!  watch<NetworkSample> --> SamplerHandle::get_current_sample()
//! ```

pub mod config;
pub mod connections;
pub mod discovery;
pub mod error;
pub mod fingerprint;
pub mod probe;
pub mod sampler;
pub mod watcher;

// --- Public API Re-exports ---

// Sampler
pub use sampler::{Sampler, SamplerBuilder, SamplerHandle};

// Watcher
pub use watcher::{ChangeWatcher, FingerprintTracker, ReinitializeTarget};

// Configuration
pub use config::{SamplerConfig, WatcherConfig};

// Error
pub use error::NetmonError;

// Probes
pub use probe::{ProbeOutcome, ProbePlan, TcpConnector, TokioConnector};

// Discovery
pub use discovery::{NetworkDiscovery, SystemDiscovery, discover_environment};
pub use fingerprint::NetworkFingerprint;

// Connections
pub use connections::{ConnectionLister, ProcNetLister};
