#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ThreatIntelError`)
//! - [`config`]: Source and cache configuration (`IntelConfig`)
//! - [`source`]: Reputation source trait (`ReputationSource`, `SourceVerdict`)
//! - [`greynoise`]: GreyNoise community API source
//! - [`abuseipdb`]: AbuseIPDB check API source
//! - [`limiter`]: Per-source call spacing (`RateLimiter`)
//! - [`cache`]: TTL cache with insertion-order eviction (`ThreatCache`)
//! - [`recent`]: Bounded IP set with the same eviction (`RecentIps`)
//! - [`aggregator`]: Multi-source lookup and verdict combination (`ReputationAggregator`)

pub mod abuseipdb;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod greynoise;
pub mod limiter;
pub mod recent;
pub mod source;

// --- Public API Re-exports ---

pub use abuseipdb::AbuseIpDbSource;
pub use aggregator::{IntelStatistics, ReputationAggregator, combine_verdicts, is_public};
pub use cache::ThreatCache;
pub use config::IntelConfig;
pub use error::ThreatIntelError;
pub use greynoise::GreyNoiseSource;
pub use limiter::RateLimiter;
pub use recent::RecentIps;
pub use source::{ReputationSource, SourceVerdict};
