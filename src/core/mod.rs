//! Numeric core of the sleep metrics engine.
//!
//! This module contains:
//! - Payload decoding and the movement score extractor
//! - Timestamp parsing
//! - Resampling onto fixed grids
//! - Sleep/wake classification and the metrics derived from it
//! - HRV estimation and stage segmentation

pub mod classifier;
pub mod hrv;
pub mod metrics;
pub mod payload;
pub mod report;
pub mod resample;
pub mod stages;
pub mod timestamp;

// Re-export commonly used types
pub use classifier::{classify, Classification, EpochLabel, SleepState};
pub use hrv::{estimate as estimate_hrv, HrvMetrics};
pub use metrics::{summarize, SleepMetrics, SleepWakeSummary};
pub use payload::{AccelerometerPayload, HeartRatePayload, SensorType};
pub use report::SessionReport;
pub use resample::{bin_mean, forward_fill, HeartRateSeries, MovementSeries, UniformSeries};
pub use stages::{segment, SleepStage, StageInterval};
pub use timestamp::{parse_captured_at, parse_date};
