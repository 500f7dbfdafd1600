//! Row shapes exchanged with the sample and result stores.

use crate::core::classifier::EpochLabel;
use crate::core::metrics::SleepMetrics;
use crate::core::report::SessionReport;
use crate::core::stages::{SleepStage, StageInterval};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a sleep session (`sleep_record_id` in the tables).
pub type SessionId = i64;

/// One raw sensor sample as stored.
///
/// `value` is kept undecoded; it may be a JSON object or a string holding one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSampleRow {
    pub sleep_record_id: SessionId,
    pub sensor_type: String,
    pub value: serde_json::Value,
    pub captured_at: String,
}

/// Per-minute sleep/wake state (0 = sleep, 1 = wake).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub sleep_record_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub state: u8,
}

impl ClassificationRow {
    pub fn new(session_id: SessionId, label: &EpochLabel) -> Self {
        Self {
            sleep_record_id: session_id,
            timestamp: label.timestamp,
            state: label.state.as_int(),
        }
    }
}

/// Session metrics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub sleep_record_id: SessionId,
    pub sol_seconds: Option<i64>,
    pub waso_minutes: Option<i64>,
    pub fragmentation_index: Option<f64>,
    pub hrv_rmssd: Option<f64>,
    pub hrv_sdnn: Option<f64>,
    pub total_sleep_time: Option<i64>,
    pub is_valid: bool,
}

impl MetricsRow {
    pub fn new(session_id: SessionId, metrics: &SleepMetrics) -> Self {
        Self {
            sleep_record_id: session_id,
            sol_seconds: metrics.sol_seconds,
            waso_minutes: metrics.waso_minutes,
            fragmentation_index: metrics.fragmentation_index,
            hrv_rmssd: metrics.hrv_rmssd,
            hrv_sdnn: metrics.hrv_sdnn,
            total_sleep_time: metrics.total_sleep_time_minutes,
            is_valid: metrics.is_valid,
        }
    }
}

/// Stage interval row. Bounds are null for the invalid sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRow {
    pub sleep_record_id: SessionId,
    pub stage: SleepStage,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl StageRow {
    pub fn new(session_id: SessionId, interval: &StageInterval) -> Self {
        Self {
            sleep_record_id: session_id,
            stage: interval.stage,
            start_time: interval.start_time,
            end_time: interval.end_time,
        }
    }
}

/// All rows written for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRows {
    pub classification: Vec<ClassificationRow>,
    pub metrics: MetricsRow,
    pub stages: Vec<StageRow>,
}

impl SessionRows {
    /// Map a report onto rows. Classification rows only exist for valid sessions.
    pub fn from_report(report: &SessionReport) -> Self {
        let id = report.session_id;
        let classification = if report.is_valid() {
            report
                .classification
                .iter()
                .map(|label| ClassificationRow::new(id, label))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            classification,
            metrics: MetricsRow::new(id, &report.metrics),
            stages: report.stages.iter().map(|s| StageRow::new(id, s)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_row_sentinel_serializes_nulls() {
        let row = StageRow::new(7, &StageInterval::invalid());
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(
            value,
            json!({"sleep_record_id": 7, "stage": "invalid", "start_time": null, "end_time": null})
        );
    }

    #[test]
    fn test_metrics_row_column_names() {
        let row = MetricsRow::new(3, &SleepMetrics::invalid());
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["total_sleep_time"], json!(null));
        assert_eq!(value["is_valid"], json!(false));
        assert_eq!(value["sleep_record_id"], json!(3));
    }

    #[test]
    fn test_raw_row_accepts_text_payload() {
        let row: RawSampleRow = serde_json::from_value(json!({
            "sleep_record_id": 1,
            "sensor_type": "heart_rate",
            "value": "{\"heartRate\": 61}",
            "captured_at": "2024-01-15 23:00:00.123+00"
        }))
        .unwrap();

        assert!(row.value.is_string());
    }
}
