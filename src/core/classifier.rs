//! Cole-Kripke style sleep/wake classification.
//!
//! Each minute is scored by convolving the movement series with a short,
//! center-weighted kernel and compared against an adaptive threshold.

use crate::config::PipelineConfig;
use crate::core::resample::MovementSeries;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Per-epoch sleep/wake state. Encoded as 0 = sleep, 1 = wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepState {
    Sleep,
    Wake,
}

impl SleepState {
    /// Integer encoding used for storage and arithmetic.
    pub fn as_int(self) -> u8 {
        match self {
            SleepState::Sleep => 0,
            SleepState::Wake => 1,
        }
    }

    pub fn is_sleep(self) -> bool {
        self == SleepState::Sleep
    }
}

/// Classification of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLabel {
    pub timestamp: DateTime<Utc>,
    pub state: SleepState,
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// One label per movement bin
    pub labels: Vec<EpochLabel>,
    /// Convolved scores the labels were derived from
    pub scores: Vec<f64>,
    /// Threshold that was applied
    pub threshold: f64,
    /// Whether the input was flat
    pub constant_input: bool,
}

impl Classification {
    /// Label states in order.
    pub fn states(&self) -> Vec<SleepState> {
        self.labels.iter().map(|l| l.state).collect()
    }
}

/// Centered convolution with output length equal to the input length.
///
/// Positions outside the input contribute zero.
pub fn convolve_same(values: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = values.len() as isize;
    let half = (kernel.len() / 2) as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let j = i + half - k as isize;
                    (0..n).contains(&j).then(|| w * values[j as usize])
                })
                .sum()
        })
        .collect()
}

/// Whether every value equals the first within `atol + rtol * |first|`.
pub fn is_constant(values: &[f64], rtol: f64, atol: f64) -> bool {
    match values.first() {
        Some(&first) => values
            .iter()
            .all(|v| (v - first).abs() <= atol + rtol * first.abs()),
        None => true,
    }
}

/// Classify each movement bin as sleep or wake.
///
/// Requires at least as many bins as the kernel is long.
pub fn classify(
    series: &MovementSeries,
    config: &PipelineConfig,
) -> Result<Classification, PipelineError> {
    let values = &series.values;
    let required = config.min_bins();
    if values.len() < required {
        return Err(PipelineError::InsufficientSamples {
            bins: values.len(),
            required,
        });
    }

    let constant_input = is_constant(values, config.constant_rtol, config.constant_atol);
    let scores = if constant_input {
        let flat = values[0] * config.kernel.iter().sum::<f64>();
        vec![flat; values.len()]
    } else {
        convolve_same(values, &config.kernel)
    };

    let mean = values.iter().mean();
    let mut threshold = (config.base_threshold * config.threshold_scale)
        .min(mean * config.mean_threshold_scale);
    if constant_input && values[0] < config.still_movement_level {
        threshold = config.base_threshold * config.still_threshold_scale;
    }

    debug!(
        bins = values.len(),
        mean,
        min = values.iter().copied().fold(f64::INFINITY, f64::min),
        max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        constant_input,
        threshold,
        "Classifying movement series"
    );

    let labels = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| EpochLabel {
            timestamp: series.timestamp_at(i),
            state: if score >= threshold {
                SleepState::Wake
            } else {
                SleepState::Sleep
            },
        })
        .collect();

    Ok(Classification {
        labels,
        scores,
        threshold,
        constant_input,
    })
}
