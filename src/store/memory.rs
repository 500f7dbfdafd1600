//! In-process store for the CLI and tests.

use crate::core::payload::SensorType;
use crate::error::StoreError;
use crate::store::types::{ClassificationRow, MetricsRow, RawSampleRow, SessionId, StageRow};
use crate::store::{ResultSink, SampleSource};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// Result rows held for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoredResults {
    pub classification: Vec<ClassificationRow>,
    pub metrics: Vec<MetricsRow>,
    pub stages: Vec<StageRow>,
}

/// Raw samples and results kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    samples: RwLock<Vec<RawSampleRow>>,
    results: RwLock<BTreeMap<SessionId, StoredResults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw rows.
    pub fn with_samples(samples: Vec<RawSampleRow>) -> Self {
        Self {
            samples: RwLock::new(samples),
            results: RwLock::default(),
        }
    }

    /// Load raw rows from a file holding a JSON array or one JSON object per line.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let samples = parse_rows(&content)?;
        debug!(path = %path.display(), rows = samples.len(), "Loaded raw samples");
        Ok(Self::with_samples(samples))
    }

    /// Append raw rows.
    pub async fn push_samples(&self, rows: impl IntoIterator<Item = RawSampleRow>) {
        self.samples.write().await.extend(rows);
    }

    /// Results stored for a session (empty when none).
    pub async fn results(&self, session_id: SessionId) -> StoredResults {
        self.results
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of all stored results keyed by session.
    pub async fn all_results(&self) -> BTreeMap<SessionId, StoredResults> {
        self.results.read().await.clone()
    }
}

fn parse_rows(content: &str) -> Result<Vec<RawSampleRow>, StoreError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| StoreError::Serialization(e.to_string()));
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| StoreError::Serialization(format!("line {}: {e}", n + 1)))
        })
        .collect()
}

impl SampleSource for MemoryStore {
    async fn fetch_samples(&self, session_id: SessionId) -> Result<Vec<RawSampleRow>, StoreError> {
        Ok(self
            .samples
            .read()
            .await
            .iter()
            .filter(|row| row.sleep_record_id == session_id)
            .cloned()
            .collect())
    }

    async fn sessions_with(&self, sensor: SensorType) -> Result<Vec<SessionId>, StoreError> {
        let mut ids: Vec<SessionId> = self
            .samples
            .read()
            .await
            .iter()
            .filter(|row| row.sensor_type == sensor.as_str())
            .map(|row| row.sleep_record_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl ResultSink for MemoryStore {
    async fn clear_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        self.results.write().await.remove(&session_id);
        Ok(())
    }

    async fn insert_classification(&self, rows: &[ClassificationRow]) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        for row in rows {
            results
                .entry(row.sleep_record_id)
                .or_default()
                .classification
                .push(row.clone());
        }
        Ok(())
    }

    async fn insert_metrics(&self, row: &MetricsRow) -> Result<(), StoreError> {
        self.results
            .write()
            .await
            .entry(row.sleep_record_id)
            .or_default()
            .metrics
            .push(row.clone());
        Ok(())
    }

    async fn insert_stages(&self, rows: &[StageRow]) -> Result<(), StoreError> {
        let mut results = self.results.write().await;
        for row in rows {
            results
                .entry(row.sleep_record_id)
                .or_default()
                .stages
                .push(row.clone());
        }
        Ok(())
    }
}
