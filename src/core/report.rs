//! Result of computing one session.

use crate::core::classifier::EpochLabel;
use crate::core::metrics::SleepMetrics;
use crate::core::stages::StageInterval;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything computed for a session in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session the samples belong to
    pub session_id: i64,
    /// Identifier of this computation
    pub run_id: Uuid,
    /// When the computation finished
    pub computed_at: DateTime<Utc>,
    /// Per-minute labels; empty unless the session is valid
    pub classification: Vec<EpochLabel>,
    /// Session metrics
    pub metrics: SleepMetrics,
    /// Stage intervals, or the single invalid sentinel
    pub stages: Vec<StageInterval>,
    /// Conditions that nulled or reduced part of the output
    pub degradations: Vec<PipelineError>,
    /// Raw rows that could not be decoded
    pub skipped_samples: usize,
}

impl SessionReport {
    pub fn is_valid(&self) -> bool {
        self.metrics.is_valid
    }

    /// Whether the stage output is the invalid sentinel.
    pub fn stages_invalid(&self) -> bool {
        matches!(self.stages.as_slice(), [only] if only.is_sentinel())
    }

    /// Whether the run completed without any degradation.
    pub fn is_complete(&self) -> bool {
        self.degradations.is_empty()
    }
}
