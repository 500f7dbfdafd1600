//! End-to-end pipeline scenarios against the in-memory store

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use synheart_sleep_metrics::core::SleepState;
use synheart_sleep_metrics::store::{RawSampleRow, StoredResults};
use synheart_sleep_metrics::{
    compute_session, process_session, MemoryStore, PipelineConfig, PipelineError, ResultSink,
    SessionReport, SleepStage,
};

const SESSION: i64 = 42;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap()
}

/// Accelerometer row whose movement score is `score`.
fn movement(minute: i64, score: f64) -> RawSampleRow {
    RawSampleRow {
        sleep_record_id: SESSION,
        sensor_type: "accelerometer".to_string(),
        value: json!({"movement_detected": false, "movement_delta": score / 2.0}),
        captured_at: (base() + Duration::minutes(minute) + Duration::seconds(5)).to_rfc3339(),
    }
}

fn heart_rate(second: i64, bpm: f64) -> RawSampleRow {
    RawSampleRow {
        sleep_record_id: SESSION,
        sensor_type: "heart_rate".to_string(),
        // Stored as text, with mixed timestamp precision
        value: json!(format!("{{\"heartRate\": {bpm}}}")),
        captured_at: (base() + Duration::seconds(second))
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string(),
    }
}

fn movement_rows(scores: &[f64]) -> Vec<RawSampleRow> {
    scores
        .iter()
        .enumerate()
        .map(|(m, &s)| movement(m as i64, s))
        .collect()
}

fn steady_heart_rate(seconds: i64, bpm: f64) -> Vec<RawSampleRow> {
    (0..seconds).map(|s| heart_rate(s, bpm)).collect()
}

fn states(report: &SessionReport) -> Vec<SleepState> {
    report.classification.iter().map(|l| l.state).collect()
}

fn assert_stages_well_formed(report: &SessionReport) {
    if report.stages_invalid() {
        return;
    }
    for interval in &report.stages {
        assert!(interval.duration().unwrap() >= Duration::seconds(60));
    }
    for pair in report.stages.windows(2) {
        assert!(pair[0].end_time.unwrap() <= pair[1].start_time.unwrap());
    }
}

#[test]
fn test_still_session_is_all_sleep() {
    let mut rows = movement_rows(&[0.0; 10]);
    rows.extend(steady_heart_rate(600, 60.0));

    let report = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();

    assert!(report.is_valid());
    assert!(states(&report).iter().all(|s| s.is_sleep()));
    assert_eq!(report.metrics.total_sleep_time_minutes, Some(10));
    assert_eq!(report.metrics.waso_minutes, Some(0));
    assert_eq!(report.metrics.sol_seconds, Some(0));
    assert_eq!(report.metrics.fragmentation_index, Some(0.0));
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage, SleepStage::Light);
    assert!(report.is_complete());
}

#[test]
fn test_alternating_movement_alternates_labels() {
    let scores: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 1.5 } else { 0.0 }).collect();
    let report =
        compute_session(SESSION, &movement_rows(&scores), &PipelineConfig::default()).unwrap();

    let expected: Vec<SleepState> = (0..10)
        .map(|i| {
            if i % 2 == 0 {
                SleepState::Wake
            } else {
                SleepState::Sleep
            }
        })
        .collect();
    assert_eq!(states(&report), expected);

    let fragmentation = report.metrics.fragmentation_index.unwrap();
    assert!((fragmentation - 0.9).abs() < 1e-12);
    assert_eq!(report.metrics.sol_seconds, Some(60));
    assert_eq!(report.metrics.total_sleep_time_minutes, Some(5));
    assert_eq!(report.metrics.waso_minutes, Some(4));
}

#[test]
fn test_constant_heart_rate_has_zero_variability() {
    let mut rows = movement_rows(&[0.0; 10]);
    rows.extend(steady_heart_rate(5, 60.0));

    let report = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();

    assert_eq!(report.metrics.hrv_rmssd, Some(0.0));
    assert_eq!(report.metrics.hrv_sdnn, Some(0.0));
    // Only the first epoch matches a heart rate sample; its run is extended.
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].start_time, Some(base()));
    assert_eq!(report.stages[0].end_time, Some(base() + Duration::minutes(1)));
}

#[test]
fn test_no_accelerometer_is_invalid() {
    let report = compute_session(
        SESSION,
        &steady_heart_rate(120, 60.0),
        &PipelineConfig::default(),
    )
    .unwrap();

    assert!(!report.is_valid());
    assert_eq!(report.metrics.sol_seconds, None);
    assert_eq!(report.metrics.waso_minutes, None);
    assert_eq!(report.metrics.fragmentation_index, None);
    assert_eq!(report.metrics.hrv_rmssd, None);
    assert_eq!(report.metrics.hrv_sdnn, None);
    assert_eq!(report.metrics.total_sleep_time_minutes, None);
    assert!(report.classification.is_empty());
    assert!(report.stages_invalid());
    assert!(matches!(
        report.degradations.as_slice(),
        [PipelineError::MissingData(_)]
    ));
}

#[test]
fn test_six_bins_is_invalid() {
    let mut rows = movement_rows(&[0.4, 0.0, 2.0, 0.0, 0.1, 0.0]);
    rows.extend(steady_heart_rate(360, 55.0));

    let report = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();

    assert!(!report.is_valid());
    assert_eq!(report.metrics.total_sleep_time_minutes, None);
    assert!(report.stages_invalid());
    assert_eq!(
        report.degradations,
        vec![PipelineError::InsufficientSamples {
            bins: 6,
            required: 7
        }]
    );
}

#[test]
fn test_sleep_onset_latency_is_whole_minutes() {
    let scores = [1.5, 1.5, 1.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    let report =
        compute_session(SESSION, &movement_rows(&scores), &PipelineConfig::default()).unwrap();

    let first_sleep = states(&report).iter().position(|s| s.is_sleep()).unwrap();
    assert_eq!(first_sleep, 3);
    assert_eq!(report.metrics.sol_seconds, Some(180));
}

#[test]
fn test_missing_heart_rate_only_nulls_hrv() {
    let report =
        compute_session(SESSION, &movement_rows(&[0.0; 8]), &PipelineConfig::default()).unwrap();

    assert!(report.is_valid());
    assert_eq!(report.metrics.total_sleep_time_minutes, Some(8));
    assert_eq!(report.metrics.hrv_rmssd, None);
    assert!(report.stages_invalid());
    assert!(matches!(
        report.degradations.as_slice(),
        [PipelineError::InvalidHeartRate(_)]
    ));
}

#[test]
fn test_mixed_session_properties() {
    let scores: Vec<f64> = (0..40)
        .map(|m| match m {
            0..=4 => 2.0,
            18 | 19 => 1.2,
            35..=39 => 0.9,
            _ => 0.0,
        })
        .collect();
    let mut rows = movement_rows(&scores);
    rows.extend((0..2400).step_by(2).map(|s| {
        let bpm = if (900..1500).contains(&s) { 52.0 } else { 64.0 + (s % 7) as f64 };
        heart_rate(s, bpm)
    }));

    let report = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();
    assert!(report.is_valid());

    let tst = report.metrics.total_sleep_time_minutes.unwrap();
    let wake = states(&report).iter().filter(|s| !s.is_sleep()).count() as i64;
    assert_eq!(tst + wake, report.classification.len() as i64);

    let fragmentation = report.metrics.fragmentation_index.unwrap();
    assert!((0.0..=1.0).contains(&fragmentation));

    assert!(report.stages.iter().any(|s| s.stage == SleepStage::Deep));
    assert_stages_well_formed(&report);
    assert!(report.metrics.hrv_sdnn.unwrap() > 0.0);
}

#[test]
fn test_malformed_rows_are_skipped() {
    let mut rows = movement_rows(&[0.0; 8]);
    rows.push(RawSampleRow {
        sleep_record_id: SESSION,
        sensor_type: "accelerometer".to_string(),
        value: json!({"battery": 12}),
        captured_at: base().to_rfc3339(),
    });
    rows.push(RawSampleRow {
        sleep_record_id: SESSION,
        sensor_type: "heart_rate".to_string(),
        value: json!({"heartRate": 60}),
        captured_at: "yesterday".to_string(),
    });

    let report = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();

    assert_eq!(report.skipped_samples, 2);
    assert!(report.is_valid());
    assert_eq!(report.classification.len(), 8);
}

#[tokio::test]
async fn test_process_session_persists_rows() {
    let mut rows = movement_rows(&[0.0; 10]);
    rows.extend(steady_heart_rate(600, 60.0));
    let store = MemoryStore::with_samples(rows);

    let report = process_session(&store, &store, SESSION, &PipelineConfig::default())
        .await
        .unwrap();
    let stored = store.results(SESSION).await;

    assert_eq!(stored.classification.len(), 10);
    assert!(stored.classification.iter().all(|r| r.state == 0));
    assert_eq!(stored.metrics.len(), 1);
    assert_eq!(stored.metrics[0].total_sleep_time, Some(10));
    assert_eq!(stored.stages.len(), report.stages.len());
}

#[tokio::test]
async fn test_invalid_session_persists_sentinel() {
    let store = MemoryStore::with_samples(steady_heart_rate(60, 58.0));

    process_session(&store, &store, SESSION, &PipelineConfig::default())
        .await
        .unwrap();
    let stored = store.results(SESSION).await;

    assert!(stored.classification.is_empty());
    assert_eq!(stored.metrics.len(), 1);
    assert!(!stored.metrics[0].is_valid);
    assert_eq!(stored.stages.len(), 1);
    assert_eq!(stored.stages[0].stage, SleepStage::Invalid);
    assert_eq!(stored.stages[0].start_time, None);
}

#[tokio::test]
async fn test_rerun_without_clear_duplicates_rows() {
    let store = MemoryStore::with_samples(movement_rows(&[0.0; 7]));
    let config = PipelineConfig::default();

    process_session(&store, &store, SESSION, &config).await.unwrap();
    process_session(&store, &store, SESSION, &config).await.unwrap();
    assert_eq!(store.results(SESSION).await.metrics.len(), 2);

    store.clear_session(SESSION).await.unwrap();
    assert_eq!(store.results(SESSION).await, StoredResults::default());
}

#[test]
fn test_alignment_tolerance_is_configurable() {
    let mut rows = movement_rows(&[0.0; 8]);
    // Heart rate covers 23:03:20..23:03:40, 20 s from the nearest epochs
    rows.push(heart_rate(200, 60.0));
    rows.push(heart_rate(210, 61.0));
    rows.push(heart_rate(220, 60.0));

    let strict = compute_session(SESSION, &rows, &PipelineConfig::default()).unwrap();
    assert!(strict.is_valid());
    assert!(strict.stages_invalid());
    assert!(strict
        .degradations
        .contains(&PipelineError::AlignmentFailure { tolerance_secs: 15 }));

    let lenient = PipelineConfig {
        alignment_tolerance: std::time::Duration::from_secs(30),
        ..Default::default()
    };
    let report = compute_session(SESSION, &rows, &lenient).unwrap();
    assert!(!report.stages_invalid());
    assert_eq!(report.stages[0].start_time, Some(base() + Duration::minutes(3)));
    assert_stages_well_formed(&report);
}
