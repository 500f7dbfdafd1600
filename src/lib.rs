//! Synheart Sleep Metrics - sleep analysis for completed sleep sessions.
//!
//! This library turns the raw accelerometer and heart rate samples of one
//! sleep session into per-minute sleep/wake labels, session metrics (SOL,
//! WASO, fragmentation, TST, RMSSD, SDNN) and wake/light/deep stage
//! intervals.
//!
//! # Guarantees
//!
//! - **Typed decoding**: malformed payloads are skipped and counted, never read as zero
//! - **Graceful degradation**: insufficient data nulls fields instead of failing the session
//! - **Explicit constants**: every threshold lives in a validated [`PipelineConfig`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Synheart Sleep Metrics                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ SampleSource│──▶│  Resample   │──▶│ Cole-Kripke │       │
//! │  │  (store)    │   │ (60s / 1s)  │   │  classify   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │    HRV      │   │  Metrics +  │       │
//! │                    │ RMSSD/SDNN  │   │   Stages    │       │
//! │                    └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           └────────┬────────┘               │
//! │                                    ▼                        │
//! │                             ┌─────────────┐                 │
//! │                             │ ResultSink  │                 │
//! │                             └─────────────┘                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use synheart_sleep_metrics::{pipeline, store::MemoryStore, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::from_file("samples.ndjson".as_ref())?;
//! let report = pipeline::process_session(&store, &store, 42, &PipelineConfig::default()).await?;
//! println!("valid: {}", report.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use batch::{run_batch, BatchSummary};
pub use config::{Config, PipelineConfig, ShortStagePolicy};
pub use core::{
    EpochLabel, HrvMetrics, SessionReport, SleepMetrics, SleepStage, SleepState, StageInterval,
};
pub use error::{
    ConfigError, DateFormatError, PayloadFormatError, PipelineError, ProcessError, StoreError,
};
pub use pipeline::{compute_session, process_session};
pub use store::{MemoryStore, ResultSink, SampleSource, SessionId};

#[cfg(feature = "rest")]
pub use store::RestStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
