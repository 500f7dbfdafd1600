//! Batch reprocessing of every session with accelerometer data.
//!
//! Each session is cleared and recomputed on its own. A failing session is
//! logged and recorded, and the batch moves on to the next one.

use crate::config::PipelineConfig;
use crate::core::payload::SensorType;
use crate::error::ProcessError;
use crate::pipeline::process_session;
use crate::store::{ResultSink, SampleSource, SessionId};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Sessions found with accelerometer data
    pub total: usize,
    /// Sessions computed and persisted
    pub succeeded: usize,
    /// Of the succeeded sessions, those that failed the validity gate
    pub invalid: usize,
    /// Sessions that errored, with the error message
    pub failed: Vec<(SessionId, String)>,
    /// Whether the run stopped before reaching every session
    pub interrupted: bool,
}

impl BatchSummary {
    /// Sessions that were attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

async fn reprocess<S, R>(
    source: &S,
    sink: &R,
    session_id: SessionId,
    config: &PipelineConfig,
) -> Result<bool, ProcessError>
where
    S: SampleSource + Sync,
    R: ResultSink + Sync,
{
    sink.clear_session(session_id).await?;
    let report = process_session(source, sink, session_id, config).await?;
    Ok(report.is_valid())
}

/// Recompute every session with accelerometer data.
///
/// `stop` is checked between sessions; setting it ends the run after the
/// session in progress. Only failure to list sessions is returned as an error.
pub async fn run_batch<S, R>(
    source: &S,
    sink: &R,
    config: &PipelineConfig,
    stop: &AtomicBool,
) -> Result<BatchSummary, ProcessError>
where
    S: SampleSource + Sync,
    R: ResultSink + Sync,
{
    config.validate()?;

    let session_ids = source.sessions_with(SensorType::Accelerometer).await?;
    let mut summary = BatchSummary {
        total: session_ids.len(),
        ..Default::default()
    };

    if session_ids.is_empty() {
        warn!("No sessions with accelerometer data");
        return Ok(summary);
    }
    info!(sessions = session_ids.len(), "Starting batch");

    for (i, &session_id) in session_ids.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            warn!(processed = i, remaining = session_ids.len() - i, "Batch interrupted");
            summary.interrupted = true;
            break;
        }

        info!(session_id, n = i + 1, of = session_ids.len(), "Processing session");
        match reprocess(source, sink, session_id, config).await {
            Ok(is_valid) => {
                summary.succeeded += 1;
                if !is_valid {
                    summary.invalid += 1;
                }
            }
            Err(e) => {
                error!(session_id, error = %e, "Failed to process session");
                summary.failed.push((session_id, e.to_string()));
            }
        }
    }

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        invalid = summary.invalid,
        failed = summary.failed.len(),
        "Batch complete"
    );

    Ok(summary)
}
