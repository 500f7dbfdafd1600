//! PostgREST-backed store.
//!
//! Reads `raw_sensor_data` and writes `sleep_classification`,
//! `sleep_metrics` and `sleep_stages`, authenticating with the project API
//! key both as `apikey` and as a bearer token.

use crate::config::RestConfig;
use crate::core::payload::SensorType;
use crate::error::StoreError;
use crate::store::types::{ClassificationRow, MetricsRow, RawSampleRow, SessionId, StageRow};
use crate::store::{ResultSink, SampleSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

const RAW_TABLE: &str = "raw_sensor_data";
const CLASSIFICATION_TABLE: &str = "sleep_classification";
const METRICS_TABLE: &str = "sleep_metrics";
const STAGES_TABLE: &str = "sleep_stages";

const RESULT_TABLES: [&str; 3] = [CLASSIFICATION_TABLE, METRICS_TABLE, STAGES_TABLE];

/// Store client for a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestStore {
    config: RestConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SessionRef {
    sleep_record_id: SessionId,
}

impl RestStore {
    /// Create a new store client.
    pub fn new(config: RestConfig) -> Result<Self, StoreError> {
        if config.base_url.trim().is_empty() {
            return Err(StoreError::Config("base_url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// URL of a table endpoint.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn select<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = Self::send(self.request(reqwest::Method::GET, table).query(query)).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T) -> Result<(), StoreError> {
        Self::send(
            self.request(reqwest::Method::POST, table)
                .header("Prefer", "return=minimal")
                .json(rows),
        )
        .await?;
        Ok(())
    }
}

impl SampleSource for RestStore {
    async fn fetch_samples(&self, session_id: SessionId) -> Result<Vec<RawSampleRow>, StoreError> {
        let rows: Vec<RawSampleRow> = self
            .select(
                RAW_TABLE,
                &[
                    (
                        "select",
                        "sleep_record_id,sensor_type,value,captured_at".to_string(),
                    ),
                    ("sleep_record_id", format!("eq.{session_id}")),
                ],
            )
            .await?;
        debug!(session_id, rows = rows.len(), "Fetched raw samples");
        Ok(rows)
    }

    async fn sessions_with(&self, sensor: SensorType) -> Result<Vec<SessionId>, StoreError> {
        let refs: Vec<SessionRef> = self
            .select(
                RAW_TABLE,
                &[
                    ("select", "sleep_record_id".to_string()),
                    ("sensor_type", format!("eq.{sensor}")),
                ],
            )
            .await?;

        let mut ids: Vec<SessionId> = refs.into_iter().map(|r| r.sleep_record_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl ResultSink for RestStore {
    async fn clear_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        for table in RESULT_TABLES {
            Self::send(
                self.request(reqwest::Method::DELETE, table)
                    .query(&[("sleep_record_id", format!("eq.{session_id}"))]),
            )
            .await?;
        }
        debug!(session_id, "Cleared prior results");
        Ok(())
    }

    async fn insert_classification(&self, rows: &[ClassificationRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.insert(CLASSIFICATION_TABLE, rows).await
    }

    async fn insert_metrics(&self, row: &MetricsRow) -> Result<(), StoreError> {
        self.insert(METRICS_TABLE, row).await
    }

    async fn insert_stages(&self, rows: &[StageRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.insert(STAGES_TABLE, rows).await
    }
}
