//! Wake/light/deep stage segmentation.
//!
//! Heart rate is matched onto the epoch timestamps, each matched epoch is
//! staged from its sleep/wake label and where its heart rate falls in the
//! session's distribution, and runs of equal stages become intervals.

use crate::config::{span, PipelineConfig, ShortStagePolicy};
use crate::core::classifier::{EpochLabel, SleepState};
use crate::core::resample::HeartRateSeries;
use crate::error::PipelineError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Stage of one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStage {
    Wake,
    Light,
    Deep,
    /// Sentinel for sessions that could not be staged
    Invalid,
}

impl SleepStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::Wake => "wake",
            SleepStage::Light => "light",
            SleepStage::Deep => "deep",
            SleepStage::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage interval. Both bounds are `None` only for the invalid sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInterval {
    pub stage: SleepStage,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl StageInterval {
    /// The single interval emitted for a session that could not be staged.
    pub fn invalid() -> Self {
        Self {
            stage: SleepStage::Invalid,
            start_time: None,
            end_time: None,
        }
    }

    fn new(stage: SleepStage, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            stage,
            start_time: Some(start),
            end_time: Some(end),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.stage == SleepStage::Invalid
    }

    /// Length of the interval, `None` for the sentinel.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.end_time? - self.start_time?)
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `p` is in [0, 100]. Returns `None` for empty input.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// An epoch with a matched heart rate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AlignedEpoch {
    timestamp: DateTime<Utc>,
    state: SleepState,
    bpm: f64,
}

fn align(labels: &[EpochLabel], heart_rate: &HeartRateSeries, tolerance: Duration) -> Vec<AlignedEpoch> {
    let mut sorted = labels.to_vec();
    sorted.sort_by_key(|l| l.timestamp);

    sorted
        .into_iter()
        .filter_map(|label| {
            heart_rate
                .nearest_index(label.timestamp, tolerance)
                .map(|i| AlignedEpoch {
                    timestamp: label.timestamp,
                    state: label.state,
                    bpm: heart_rate.values[i],
                })
        })
        .collect()
}

fn stage_of(epoch: &AlignedEpoch, deep_below: f64) -> SleepStage {
    match epoch.state {
        SleepState::Wake => SleepStage::Wake,
        SleepState::Sleep if epoch.bpm < deep_below => SleepStage::Deep,
        SleepState::Sleep => SleepStage::Light,
    }
}

/// Run-length encode staged epochs. Each run ends where the next begins; the
/// last run ends at the last timestamp, pushed out to `min_duration` when that
/// would leave it empty.
fn run_length(staged: &[(DateTime<Utc>, SleepStage)], min_duration: Duration) -> Vec<StageInterval> {
    let mut runs: Vec<StageInterval> = Vec::new();
    let mut current: Option<(SleepStage, DateTime<Utc>)> = None;

    for &(timestamp, stage) in staged {
        match current {
            Some((active, _)) if active == stage => {}
            Some((active, start)) => {
                runs.push(StageInterval::new(active, start, timestamp));
                current = Some((stage, timestamp));
            }
            None => current = Some((stage, timestamp)),
        }
    }

    if let (Some((stage, start)), Some(&(last, _))) = (current, staged.last()) {
        let end = if last <= start {
            debug!(%start, "Extending zero-length final stage");
            start + min_duration
        } else {
            last
        };
        runs.push(StageInterval::new(stage, start, end));
    }

    runs
}

fn is_short(interval: &StageInterval, min_duration: Duration) -> bool {
    interval.duration().map_or(true, |d| d < min_duration)
}

fn drop_short(runs: Vec<StageInterval>, min_duration: Duration) -> Vec<StageInterval> {
    runs.into_iter()
        .filter(|run| {
            let keep = !is_short(run, min_duration);
            if !keep {
                warn!(
                    stage = %run.stage,
                    start = ?run.start_time,
                    end = ?run.end_time,
                    "Dropping stage interval shorter than minimum duration"
                );
            }
            keep
        })
        .collect()
}

fn merge_short(runs: Vec<StageInterval>, min_duration: Duration) -> Vec<StageInterval> {
    let mut merged: Vec<StageInterval> = Vec::with_capacity(runs.len());
    let mut carried_start: Option<DateTime<Utc>> = None;

    for mut run in runs {
        if is_short(&run, min_duration) {
            match merged.last_mut() {
                Some(previous) => {
                    debug!(stage = %run.stage, into = %previous.stage, "Merging short stage into previous");
                    previous.end_time = run.end_time;
                }
                None => carried_start = carried_start.or(run.start_time),
            }
            continue;
        }

        if let Some(start) = carried_start.take() {
            run.start_time = Some(start);
        }

        match merged.last_mut() {
            Some(previous) if previous.stage == run.stage => previous.end_time = run.end_time,
            _ => merged.push(run),
        }
    }

    if merged.is_empty() && carried_start.is_some() {
        warn!("Every stage interval was shorter than the minimum duration");
    }

    merged
}

/// Segment a classified session into stage intervals.
///
/// Epochs without a heart rate sample within the alignment tolerance are left
/// out. Fails with [`PipelineError::InvalidHeartRate`] for an empty heart rate
/// series and [`PipelineError::AlignmentFailure`] when no epoch matches.
pub fn segment(
    labels: &[EpochLabel],
    heart_rate: &HeartRateSeries,
    config: &PipelineConfig,
) -> Result<Vec<StageInterval>, PipelineError> {
    if labels.is_empty() {
        return Err(PipelineError::MissingData("no classified epochs".to_string()));
    }
    if heart_rate.is_empty() {
        return Err(PipelineError::InvalidHeartRate(
            "empty heart rate series".to_string(),
        ));
    }

    let tolerance = span(config.alignment_tolerance);
    let aligned = align(labels, heart_rate, tolerance);
    if aligned.is_empty() {
        return Err(PipelineError::AlignmentFailure {
            tolerance_secs: tolerance.num_seconds(),
        });
    }

    let bpm: Vec<f64> = aligned.iter().map(|e| e.bpm).collect();
    let deep_below = percentile(&bpm, config.deep_percentile).unwrap_or(f64::NEG_INFINITY);

    debug!(
        epochs = labels.len(),
        aligned = aligned.len(),
        deep_below,
        median = percentile(&bpm, 50.0),
        "Aligned heart rate onto epochs"
    );

    let staged: Vec<(DateTime<Utc>, SleepStage)> = aligned
        .iter()
        .map(|epoch| (epoch.timestamp, stage_of(epoch, deep_below)))
        .collect();

    let min_duration = span(config.min_stage_duration);
    let runs = run_length(&staged, min_duration);

    Ok(match config.short_stage_policy {
        ShortStagePolicy::Drop => drop_short(runs, min_duration),
        ShortStagePolicy::Merge => merge_short(runs, min_duration),
    })
}
