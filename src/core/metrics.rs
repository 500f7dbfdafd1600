//! Sleep metrics derived from the sleep/wake label sequence.

use crate::core::classifier::{EpochLabel, SleepState};
use crate::core::hrv::HrvMetrics;
use serde::{Deserialize, Serialize};

/// Movement-derived summary of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepWakeSummary {
    /// Seconds from the first epoch to the first sleep epoch
    pub sol_seconds: Option<i64>,
    /// Wake epochs at or after the first sleep epoch
    pub waso_minutes: i64,
    /// Transitions per epoch (0-1)
    pub fragmentation_index: f64,
    /// Sleep epochs
    pub total_sleep_time_minutes: i64,
    /// Wake epochs
    pub wake_minutes: i64,
}

/// One metrics record per session. Numeric fields are null unless `is_valid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepMetrics {
    pub sol_seconds: Option<i64>,
    pub waso_minutes: Option<i64>,
    pub fragmentation_index: Option<f64>,
    pub hrv_rmssd: Option<f64>,
    pub hrv_sdnn: Option<f64>,
    pub total_sleep_time_minutes: Option<i64>,
    pub is_valid: bool,
}

impl SleepMetrics {
    /// Record for a session that failed the validity gate.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Record for a valid session.
    pub fn valid(summary: &SleepWakeSummary, hrv: HrvMetrics) -> Self {
        Self {
            sol_seconds: summary.sol_seconds,
            waso_minutes: Some(summary.waso_minutes),
            fragmentation_index: Some(summary.fragmentation_index),
            hrv_rmssd: hrv.rmssd,
            hrv_sdnn: hrv.sdnn,
            total_sleep_time_minutes: Some(summary.total_sleep_time_minutes),
            is_valid: true,
        }
    }
}

/// Summarize a label sequence.
///
/// Returns `None` for an empty sequence. Each epoch counts as one minute of
/// TST/WASO; latency is measured on the label timestamps.
pub fn summarize(labels: &[EpochLabel]) -> Option<SleepWakeSummary> {
    let first = labels.first()?;

    let total_sleep_time_minutes = labels.iter().filter(|l| l.state.is_sleep()).count() as i64;
    let wake_minutes = labels.len() as i64 - total_sleep_time_minutes;

    let onset = labels.iter().position(|l| l.state.is_sleep());
    let sol_seconds = onset.map(|i| (labels[i].timestamp - first.timestamp).num_seconds());
    let waso_minutes = onset
        .map(|i| {
            labels[i..]
                .iter()
                .filter(|l| l.state == SleepState::Wake)
                .count() as i64
        })
        .unwrap_or(0);

    let transitions: u32 = labels
        .windows(2)
        .map(|pair| u32::from(pair[0].state != pair[1].state))
        .sum();
    let fragmentation_index = f64::from(transitions) / labels.len() as f64;

    Some(SleepWakeSummary {
        sol_seconds,
        waso_minutes,
        fragmentation_index,
        total_sleep_time_minutes,
        wake_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn labels(states: &[u8]) -> Vec<EpochLabel> {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap();
        states
            .iter()
            .enumerate()
            .map(|(i, &s)| EpochLabel {
                timestamp: start + Duration::minutes(i as i64),
                state: if s == 0 {
                    SleepState::Sleep
                } else {
                    SleepState::Wake
                },
            })
            .collect()
    }

    #[test]
    fn test_empty_sequence() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_all_sleep() {
        let summary = summarize(&labels(&[0; 10])).unwrap();

        assert_eq!(summary.total_sleep_time_minutes, 10);
        assert_eq!(summary.waso_minutes, 0);
        assert_eq!(summary.sol_seconds, Some(0));
        assert_eq!(summary.fragmentation_index, 0.0);
    }

    #[test]
    fn test_latency_and_waso() {
        let summary = summarize(&labels(&[1, 1, 1, 0, 0, 1, 1, 0, 0, 0])).unwrap();

        assert_eq!(summary.sol_seconds, Some(180));
        assert_eq!(summary.waso_minutes, 2);
        assert_eq!(summary.total_sleep_time_minutes, 5);
        assert_eq!(summary.wake_minutes, 5);
        assert!((summary.fragmentation_index - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_never_slept() {
        let summary = summarize(&labels(&[1; 8])).unwrap();

        assert_eq!(summary.sol_seconds, None);
        assert_eq!(summary.waso_minutes, 0);
        assert_eq!(summary.total_sleep_time_minutes, 0);
    }

    #[test]
    fn test_alternating_fragmentation() {
        let summary = summarize(&labels(&[1, 0, 1, 0, 1, 0, 1, 0, 1, 0])).unwrap();
        assert!((summary.fragmentation_index - 0.9).abs() < 1e-12);
        assert!(summary.fragmentation_index <= 1.0);
    }

    #[test]
    fn test_invalid_record_is_all_null() {
        let metrics = SleepMetrics::invalid();
        assert!(!metrics.is_valid);
        assert!(metrics.sol_seconds.is_none());
        assert!(metrics.hrv_rmssd.is_none());
        assert!(metrics.total_sleep_time_minutes.is_none());
    }
}
