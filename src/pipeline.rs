//! Per-session pipeline: decode, validity gate, compute, persist.
//!
//! ```text
//! raw rows ──▶ decode ──▶ movement bins ──▶ classify ──▶ metrics
//!                 │                             │
//!                 └──▶ 1 Hz heart rate ──▶ HRV  └──▶ stages
//! ```
//!
//! Data problems never fail a session. They null the affected fields and are
//! recorded on the report as degradations.

use crate::config::{span, PipelineConfig};
use crate::core::classifier::{classify, Classification};
use crate::core::hrv::{self, HrvMetrics};
use crate::core::metrics::{summarize, SleepMetrics};
use crate::core::payload::{AccelerometerPayload, HeartRatePayload, SensorType};
use crate::core::report::SessionReport;
use crate::core::resample::{bin_mean, forward_fill};
use crate::core::stages::{segment, StageInterval};
use crate::core::timestamp::parse_captured_at;
use crate::error::{ConfigError, PipelineError, ProcessError, StoreError};
use crate::store::{RawSampleRow, ResultSink, SampleSource, SessionId, SessionRows};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Samples decoded from raw rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSamples {
    /// Movement score per accelerometer reading
    pub movement: Vec<(DateTime<Utc>, f64)>,
    /// Beats per minute per heart rate reading
    pub heart_rate: Vec<(DateTime<Utc>, f64)>,
    /// Rows dropped because they could not be decoded
    pub skipped: usize,
}

/// Decode raw rows. Undecodable rows are logged and counted, never zero-filled.
pub fn decode_samples(rows: &[RawSampleRow], config: &PipelineConfig, tz: Tz) -> DecodedSamples {
    let mut decoded = DecodedSamples::default();

    for row in rows {
        match decode_row(row, config, tz) {
            Ok((SensorType::Accelerometer, sample)) => decoded.movement.push(sample),
            Ok((SensorType::HeartRate, sample)) => decoded.heart_rate.push(sample),
            Err(reason) => {
                warn!(
                    session_id = row.sleep_record_id,
                    sensor_type = %row.sensor_type,
                    captured_at = %row.captured_at,
                    %reason,
                    "Skipping undecodable sample"
                );
                decoded.skipped += 1;
            }
        }
    }

    decoded
}

fn decode_row(
    row: &RawSampleRow,
    config: &PipelineConfig,
    tz: Tz,
) -> Result<(SensorType, (DateTime<Utc>, f64)), String> {
    let sensor: SensorType = row.sensor_type.parse().map_err(|e| format!("{e}"))?;
    let timestamp = parse_captured_at(&row.captured_at, tz).map_err(|e| e.to_string())?;

    let value = match sensor {
        SensorType::Accelerometer => AccelerometerPayload::decode(&row.value)
            .map_err(|e| e.to_string())?
            .movement_score(config),
        SensorType::HeartRate => {
            HeartRatePayload::decode(&row.value)
                .map_err(|e| e.to_string())?
                .heart_rate
        }
    };

    Ok((sensor, (timestamp, value)))
}

fn record(degradations: &mut Vec<PipelineError>, session_id: SessionId, error: PipelineError) {
    warn!(session_id, %error, "Degraded result");
    if !degradations.contains(&error) {
        degradations.push(error);
    }
}

/// Run the validity gate and classification.
///
/// Returns `Err` with the reason when the session is invalid.
fn gate(
    rows: &[RawSampleRow],
    decoded: &DecodedSamples,
    config: &PipelineConfig,
) -> Result<Classification, PipelineError> {
    if rows.is_empty() {
        return Err(PipelineError::MissingData(
            "no raw sensor rows".to_string(),
        ));
    }
    if decoded.movement.is_empty() {
        return Err(PipelineError::MissingData(
            "no accelerometer samples".to_string(),
        ));
    }

    let movement = bin_mean(&decoded.movement, span(config.movement_bin));
    debug!(bins = movement.len(), start = %movement.start, "Binned movement scores");
    classify(&movement, config)
}

/// Compute every output for one session from its raw rows.
///
/// Only an invalid configuration is an error.
pub fn compute_session(
    session_id: SessionId,
    rows: &[RawSampleRow],
    config: &PipelineConfig,
) -> Result<SessionReport, ConfigError> {
    config.validate()?;
    Ok(compute_validated(session_id, rows, config, config.tz()?))
}

fn compute_validated(
    session_id: SessionId,
    rows: &[RawSampleRow],
    config: &PipelineConfig,
    tz: Tz,
) -> SessionReport {
    let decoded = decode_samples(rows, config, tz);
    debug!(
        session_id,
        rows = rows.len(),
        movement = decoded.movement.len(),
        heart_rate = decoded.heart_rate.len(),
        skipped = decoded.skipped,
        "Decoded raw samples"
    );

    let mut degradations = Vec::new();

    let (classification, metrics, stages) = match gate(rows, &decoded, config) {
        Ok(classification) => {
            let labels = classification.labels;
            let summary = summarize(&labels);
            let heart_rate = forward_fill(&decoded.heart_rate, span(config.heart_rate_step));

            let hrv = hrv::estimate(&heart_rate, config).unwrap_or_else(|e| {
                record(&mut degradations, session_id, e);
                HrvMetrics::default()
            });

            let metrics = match &summary {
                Some(summary) => {
                    debug!(
                        session_id,
                        tst = summary.total_sleep_time_minutes,
                        sol = ?summary.sol_seconds,
                        waso = summary.waso_minutes,
                        fragmentation = summary.fragmentation_index,
                        "Summarized sleep/wake labels"
                    );
                    SleepMetrics::valid(summary, hrv)
                }
                None => SleepMetrics::invalid(),
            };

            let stages = segment(&labels, &heart_rate, config).unwrap_or_else(|e| {
                record(&mut degradations, session_id, e);
                vec![StageInterval::invalid()]
            });

            (labels, metrics, stages)
        }
        Err(e) => {
            record(&mut degradations, session_id, e);
            (
                Vec::new(),
                SleepMetrics::invalid(),
                vec![StageInterval::invalid()],
            )
        }
    };

    let report = SessionReport {
        session_id,
        run_id: Uuid::new_v4(),
        computed_at: Utc::now(),
        classification,
        metrics,
        stages,
        degradations,
        skipped_samples: decoded.skipped,
    };

    info!(
        session_id,
        run_id = %report.run_id,
        is_valid = report.is_valid(),
        epochs = report.classification.len(),
        stages = report.stages.len(),
        degradations = report.degradations.len(),
        "Computed session"
    );

    report
}

/// Write a report's rows: classification, then metrics, then stages.
pub async fn persist<R>(sink: &R, report: &SessionReport) -> Result<(), StoreError>
where
    R: ResultSink + Sync,
{
    let rows = SessionRows::from_report(report);

    sink.insert_classification(&rows.classification).await?;
    sink.insert_metrics(&rows.metrics).await?;
    sink.insert_stages(&rows.stages).await?;

    debug!(
        session_id = report.session_id,
        classification = rows.classification.len(),
        stages = rows.stages.len(),
        "Persisted results"
    );
    Ok(())
}

/// Fetch, compute and persist one session.
///
/// Prior results are not cleared; callers that re-run a session call
/// [`ResultSink::clear_session`] first.
pub async fn process_session<S, R>(
    source: &S,
    sink: &R,
    session_id: SessionId,
    config: &PipelineConfig,
) -> Result<SessionReport, ProcessError>
where
    S: SampleSource + Sync,
    R: ResultSink + Sync,
{
    config.validate()?;
    let tz = config.tz()?;

    let rows = source.fetch_samples(session_id).await?;
    let report = compute_validated(session_id, &rows, config, tz);
    persist(sink, &report).await?;

    Ok(report)
}
