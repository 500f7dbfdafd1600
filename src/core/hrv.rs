//! Heart rate variability from a 1 Hz heart rate series.
//!
//! Beats per minute are converted to inter-beat intervals, implausible
//! intervals are discarded, and the time-domain measures RMSSD and SDNN are
//! computed in milliseconds. Too few usable intervals only nulls the HRV
//! fields; it never invalidates the session.

use crate::config::PipelineConfig;
use crate::core::resample::HeartRateSeries;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Time-domain HRV measures. A field is `None` when it could not be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    /// Root mean square of successive differences (ms)
    pub rmssd: Option<f64>,
    /// Sample standard deviation of the intervals (ms)
    pub sdnn: Option<f64>,
    /// Intervals that passed the plausibility filter
    pub interval_count: usize,
    /// Time of the last synthesized beat, first beat at 0 (s)
    pub span_seconds: f64,
}

/// Convert beats per minute into inter-beat intervals (ms), dropping non-finite values.
pub fn inter_beat_intervals(bpm: &[f64]) -> Vec<f64> {
    bpm.iter()
        .map(|&hr| 60_000.0 / hr)
        .filter(|ibi| ibi.is_finite())
        .collect()
}

/// Keep intervals inside `[min_ms, max_ms]`, preserving order.
pub fn filter_plausible(intervals_ms: &[f64], min_ms: f64, max_ms: f64) -> Vec<f64> {
    intervals_ms
        .iter()
        .copied()
        .filter(|ibi| (min_ms..=max_ms).contains(ibi))
        .collect()
}

/// Beat times (s) obtained by accumulating intervals (s), starting at 0.
pub fn peak_train(intervals_s: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(intervals_s.iter().scan(0.0, |t, &dt| {
            *t += dt;
            Some(*t)
        }))
        .collect()
}

/// Root mean square of successive differences.
pub fn rmssd(intervals: &[f64]) -> Option<f64> {
    if intervals.len() < 2 {
        return None;
    }

    let squared: Vec<f64> = intervals
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).powi(2))
        .collect();
    let value = squared.iter().mean().sqrt();
    value.is_finite().then_some(value)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sdnn(intervals: &[f64]) -> Option<f64> {
    if intervals.len() < 2 {
        return None;
    }

    // A flat sequence has no spread; skip the summation residue.
    if intervals.windows(2).all(|pair| pair[0] == pair[1]) {
        return Some(0.0);
    }

    let value = intervals.iter().std_dev();
    value.is_finite().then_some(value)
}

/// Estimate HRV from a forward-filled heart rate series.
pub fn estimate(
    heart_rate: &HeartRateSeries,
    config: &PipelineConfig,
) -> Result<HrvMetrics, PipelineError> {
    if heart_rate.is_empty() {
        return Err(PipelineError::InvalidHeartRate(
            "empty heart rate series".to_string(),
        ));
    }

    let raw = inter_beat_intervals(&heart_rate.values);
    let intervals = filter_plausible(&raw, config.rri_min_ms, config.rri_max_ms);

    debug!(
        raw = raw.len(),
        plausible = intervals.len(),
        min_ms = config.rri_min_ms,
        max_ms = config.rri_max_ms,
        "Filtered inter-beat intervals"
    );

    if intervals.len() < config.min_rri_count {
        return Err(PipelineError::InvalidHeartRate(format!(
            "{} plausible intervals, need {}",
            intervals.len(),
            config.min_rri_count
        )));
    }

    let seconds: Vec<f64> = intervals.iter().map(|ms| ms / 1000.0).collect();
    let peaks = peak_train(&seconds);

    Ok(HrvMetrics {
        rmssd: rmssd(&intervals),
        sdnn: sdnn(&intervals),
        interval_count: intervals.len(),
        span_seconds: peaks.last().copied().unwrap_or(0.0),
    })
}
