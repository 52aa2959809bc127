#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`DetectorError`)
//! - [`config`]: Classifier and survey configuration (`DetectorConfig`, `SurveyConfig`)
//! - [`bands`]: Ordered threshold bands (`ThresholdBands`)
//! - [`classifier`]: Sample classification (`Classifier`)
//! - [`survey`]: Connection surge detection (`ConnectionSurvey`)

pub mod bands;
pub mod classifier;
pub mod config;
pub mod error;
pub mod survey;

// --- Public API Re-exports ---

pub use bands::ThresholdBands;
pub use classifier::{Classifier, anomaly_score, attack_type_for, confidence};
pub use config::{DetectorConfig, MetricSource, SurveyConfig};
pub use error::DetectorError;
pub use survey::{ConnectionSurvey, ProtocolCounts, SurveyLevel, new_surge_ips};
