//! Batch driver behaviour: ordering, fail-soft handling and interruption

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::AtomicBool;
use synheart_sleep_metrics::core::SensorType;
use synheart_sleep_metrics::store::{
    ClassificationRow, MetricsRow, RawSampleRow, SessionId, StageRow,
};
use synheart_sleep_metrics::{
    run_batch, MemoryStore, PipelineConfig, ResultSink, SampleSource, StoreError,
};

fn movement_rows(session: SessionId, minutes: i64) -> Vec<RawSampleRow> {
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    (0..minutes)
        .map(|m| RawSampleRow {
            sleep_record_id: session,
            sensor_type: "accelerometer".to_string(),
            value: json!({"x": 0.0, "y": 0.0, "z": 0.0}),
            captured_at: (start + Duration::minutes(m)).to_rfc3339(),
        })
        .collect()
}

fn seeded() -> MemoryStore {
    let mut rows = movement_rows(3, 10);
    rows.extend(movement_rows(1, 8));
    // Too short to classify
    rows.extend(movement_rows(2, 4));
    rows.push(RawSampleRow {
        sleep_record_id: 9,
        sensor_type: "heart_rate".to_string(),
        value: json!({"heartRate": 60}),
        captured_at: "2024-02-01T00:00:00Z".to_string(),
    });
    MemoryStore::with_samples(rows)
}

/// Memory store whose metrics writes fail for one session.
struct FlakyStore {
    inner: MemoryStore,
    fail_on: SessionId,
}

impl SampleSource for FlakyStore {
    async fn fetch_samples(&self, session_id: SessionId) -> Result<Vec<RawSampleRow>, StoreError> {
        self.inner.fetch_samples(session_id).await
    }

    async fn sessions_with(&self, sensor: SensorType) -> Result<Vec<SessionId>, StoreError> {
        self.inner.sessions_with(sensor).await
    }
}

impl ResultSink for FlakyStore {
    async fn clear_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        self.inner.clear_session(session_id).await
    }

    async fn insert_classification(&self, rows: &[ClassificationRow]) -> Result<(), StoreError> {
        self.inner.insert_classification(rows).await
    }

    async fn insert_metrics(&self, row: &MetricsRow) -> Result<(), StoreError> {
        if row.sleep_record_id == self.fail_on {
            return Err(StoreError::Server {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.inner.insert_metrics(row).await
    }

    async fn insert_stages(&self, rows: &[StageRow]) -> Result<(), StoreError> {
        self.inner.insert_stages(rows).await
    }
}

#[tokio::test]
async fn test_batch_processes_every_accelerometer_session() {
    let store = seeded();
    let stop = AtomicBool::new(false);

    let summary = run_batch(&store, &store, &PipelineConfig::default(), &stop)
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.invalid, 1);
    assert!(summary.failed.is_empty());
    assert!(!summary.interrupted);

    let results = store.all_results().await;
    assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(!results[&2].metrics[0].is_valid);
    assert_eq!(results[&3].classification.len(), 10);
}

#[tokio::test]
async fn test_batch_rerun_replaces_results() {
    let store = seeded();
    let stop = AtomicBool::new(false);
    let config = PipelineConfig::default();

    run_batch(&store, &store, &config, &stop).await.unwrap();
    run_batch(&store, &store, &config, &stop).await.unwrap();

    let results = store.all_results().await;
    for stored in results.values() {
        assert_eq!(stored.metrics.len(), 1);
    }
    assert_eq!(results[&1].classification.len(), 8);
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let store = FlakyStore {
        inner: seeded(),
        fail_on: 2,
    };
    let stop = AtomicBool::new(false);

    let summary = run_batch(&store, &store, &PipelineConfig::default(), &stop)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, 2);
    assert!(summary.failed[0].1.contains("503"));
    assert_eq!(store.inner.results(3).await.metrics.len(), 1);
}

#[tokio::test]
async fn test_batch_honors_stop_flag() {
    let store = seeded();
    let stop = AtomicBool::new(true);

    let summary = run_batch(&store, &store, &PipelineConfig::default(), &stop)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.attempted(), 0);
    assert!(store.all_results().await.is_empty());
}
