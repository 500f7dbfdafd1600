//! Sample and result store collaborators.
//!
//! The pipeline reads raw rows through [`SampleSource`] and writes results
//! through [`ResultSink`]. [`MemoryStore`] implements both in process; with
//! the `rest` feature, [`RestStore`] talks to a PostgREST endpoint.

pub mod memory;
#[cfg(feature = "rest")]
pub mod rest;
pub mod types;

use crate::core::payload::SensorType;
use crate::error::StoreError;
use std::future::Future;

pub use memory::{MemoryStore, StoredResults};
#[cfg(feature = "rest")]
pub use rest::RestStore;
pub use types::{ClassificationRow, MetricsRow, RawSampleRow, SessionId, SessionRows, StageRow};

/// Read access to raw sensor samples.
pub trait SampleSource {
    /// All raw rows of a session, in any order.
    fn fetch_samples(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<RawSampleRow>, StoreError>> + Send;

    /// Sorted, de-duplicated ids of sessions with at least one row of `sensor`.
    fn sessions_with(
        &self,
        sensor: SensorType,
    ) -> impl Future<Output = Result<Vec<SessionId>, StoreError>> + Send;
}

/// Write access to computed results.
///
/// Inserts append; repeating them for a session duplicates rows unless the
/// session was cleared first.
pub trait ResultSink {
    /// Remove every result row of a session.
    fn clear_session(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_classification(
        &self,
        rows: &[ClassificationRow],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_metrics(&self, row: &MetricsRow)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_stages(&self, rows: &[StageRow])
        -> impl Future<Output = Result<(), StoreError>> + Send;
}
