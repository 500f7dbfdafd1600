//! Configuration for the sleep metrics engine.
//!
//! [`PipelineConfig`] carries every numeric constant of the computation and is
//! passed explicitly into the pipeline. [`Config`] is the file-backed wrapper
//! used by the binary.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Cole-Kripke weights for minutes -3..+3 around the scored minute.
pub const COLE_KRIPKE_KERNEL: [f64; 7] = [0.0004, 0.004, 0.02, 0.1, 0.02, 0.004, 0.0004];

/// Longest accepted value for any duration constant.
pub const MAX_SPAN: Duration = Duration::from_secs(24 * 60 * 60);

/// Convert a duration constant for timestamp arithmetic, saturating at [`MAX_SPAN`].
pub(crate) fn span(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MAX_SPAN)).unwrap_or_else(|_| chrono::Duration::zero())
}

/// What to do with a stage interval shorter than the minimum duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortStagePolicy {
    /// Discard the interval and log it.
    Drop,
    /// Give the interval's time to the preceding interval (or the next one
    /// when it is the first).
    Merge,
}

/// Numeric constants of the sleep pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of a movement bin
    #[serde(with = "duration_serde")]
    pub movement_bin: Duration,

    /// Cadence of the forward-filled heart rate grid
    #[serde(with = "duration_serde")]
    pub heart_rate_step: Duration,

    /// Score multiplier applied to `movement_magnitude` when movement was detected
    pub detected_movement_weight: f64,

    /// Score multiplier applied to `movement_delta` otherwise
    pub movement_delta_weight: f64,

    /// Fall back to the Euclidean axis magnitude when no enriched fields exist
    pub axis_magnitude_fallback: bool,

    /// Convolution kernel (odd length, centered)
    pub kernel: Vec<f64>,

    /// Base Cole-Kripke threshold
    pub base_threshold: f64,

    /// Multiplier on the base threshold for the adaptive threshold
    pub threshold_scale: f64,

    /// Multiplier on the mean movement for the adaptive threshold
    pub mean_threshold_scale: f64,

    /// Multiplier on the base threshold for flat, near-still sessions
    pub still_threshold_scale: f64,

    /// Flat sessions below this movement level use the still threshold
    pub still_movement_level: f64,

    /// Relative tolerance of the constant-input check
    pub constant_rtol: f64,

    /// Absolute tolerance of the constant-input check
    pub constant_atol: f64,

    /// Lowest plausible inter-beat interval (ms)
    pub rri_min_ms: f64,

    /// Highest plausible inter-beat interval (ms)
    pub rri_max_ms: f64,

    /// Minimum number of plausible intervals for HRV
    pub min_rri_count: usize,

    /// Maximum distance when matching heart rate onto epochs
    #[serde(with = "duration_serde")]
    pub alignment_tolerance: Duration,

    /// Heart rate percentile under which sleep is staged deep
    pub deep_percentile: f64,

    /// Shortest stage interval that is kept
    #[serde(with = "duration_serde")]
    pub min_stage_duration: Duration,

    /// Handling of intervals shorter than `min_stage_duration`
    pub short_stage_policy: ShortStagePolicy,

    /// IANA timezone for `captured_at` values without an offset
    pub timezone: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            movement_bin: Duration::from_secs(60),
            heart_rate_step: Duration::from_secs(1),
            detected_movement_weight: 3.0,
            movement_delta_weight: 2.0,
            axis_magnitude_fallback: true,
            kernel: COLE_KRIPKE_KERNEL.to_vec(),
            base_threshold: 0.3,
            threshold_scale: 0.3,
            mean_threshold_scale: 1.0,
            still_threshold_scale: 0.5,
            still_movement_level: 1.0,
            constant_rtol: 1e-10,
            constant_atol: 1e-8,
            rri_min_ms: 500.0,
            rri_max_ms: 1200.0,
            min_rri_count: 3,
            alignment_tolerance: Duration::from_secs(15),
            deep_percentile: 25.0,
            min_stage_duration: Duration::from_secs(60),
            short_stage_policy: ShortStagePolicy::Drop,
            timezone: "UTC".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check that the constants describe a computable pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if self.kernel.is_empty() || self.kernel.len() % 2 == 0 {
            return invalid("kernel must have odd, non-zero length");
        }
        if self.kernel.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid("kernel weights must be finite and non-negative");
        }
        if self.movement_bin.as_secs() == 0 || self.movement_bin.subsec_nanos() != 0 {
            return invalid("movement_bin must be a whole, positive number of seconds");
        }
        if self.heart_rate_step.as_secs() == 0 || self.heart_rate_step.subsec_nanos() != 0 {
            return invalid("heart_rate_step must be a whole, positive number of seconds");
        }
        let weights = [
            self.base_threshold,
            self.threshold_scale,
            self.mean_threshold_scale,
            self.still_threshold_scale,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return invalid("threshold constants must be finite and positive");
        }
        if !self.detected_movement_weight.is_finite() || !self.movement_delta_weight.is_finite() {
            return invalid("movement weights must be finite");
        }
        if self.constant_rtol < 0.0 || self.constant_atol < 0.0 {
            return invalid("constant-input tolerances must be non-negative");
        }
        if !(self.rri_min_ms > 0.0 && self.rri_min_ms < self.rri_max_ms) {
            return invalid("RRI window must satisfy 0 < rri_min_ms < rri_max_ms");
        }
        if self.min_rri_count < 2 {
            return invalid("min_rri_count must be at least 2");
        }
        if !(self.deep_percentile > 0.0 && self.deep_percentile < 100.0) {
            return invalid("deep_percentile must lie in (0, 100)");
        }
        if self.min_stage_duration.is_zero() {
            return invalid("min_stage_duration must be positive");
        }
        let spans = [
            ("movement_bin", self.movement_bin),
            ("heart_rate_step", self.heart_rate_step),
            ("alignment_tolerance", self.alignment_tolerance),
            ("min_stage_duration", self.min_stage_duration),
        ];
        for (name, value) in spans {
            if value > MAX_SPAN {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not exceed {}s",
                    MAX_SPAN.as_secs()
                )));
            }
        }
        self.tz()?;
        Ok(())
    }

    /// Resolve the configured timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Number of movement bins required before classification runs.
    pub fn min_bins(&self) -> usize {
        self.kernel.len()
    }
}

/// Connection settings for the PostgREST store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL of the REST endpoint (e.g. `https://project.example.co/rest/v1`)
    pub base_url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
}

/// Main configuration for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline constants
    pub pipeline: PipelineConfig,

    /// Port for the compute endpoint
    pub server_port: u16,

    /// Remote store, when one is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            server_port: 8000,
            rest: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-sleep")
            .join("config.json")
    }

    /// Validate the pipeline constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()
    }
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
