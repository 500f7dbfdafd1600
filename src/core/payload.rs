//! Typed decoding of raw sensor payloads and the movement score extractor.
//!
//! Payloads are decoded into tagged variants instead of being read as loose
//! documents. A field only defaults to zero where that is the documented
//! fallback (absent enriched fields, absent axes when at least one axis exists).

use crate::config::PipelineConfig;
use crate::error::PayloadFormatError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Sensor that produced a raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Accelerometer,
    HeartRate,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::HeartRate => "heart_rate",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = PayloadFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accelerometer" => Ok(SensorType::Accelerometer),
            "heart_rate" => Ok(SensorType::HeartRate),
            other => Err(PayloadFormatError::UnknownSensor(other.to_string())),
        }
    }
}

/// Decoded accelerometer payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccelerometerPayload {
    /// Movement fields pre-computed on the watch
    Enriched {
        movement_detected: bool,
        movement_magnitude: f64,
        movement_delta: f64,
    },
    /// Raw axis reading
    Axes { x: f64, y: f64, z: f64 },
}

/// Decoded heart rate payload.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HeartRatePayload {
    #[serde(rename = "heartRate")]
    pub heart_rate: f64,
}

/// Wire shape of an accelerometer document; every field is optional here and
/// the variant is chosen afterwards.
#[derive(Debug, Deserialize)]
struct AccelerometerFields {
    movement_detected: Option<bool>,
    movement_magnitude: Option<f64>,
    movement_delta: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

/// Unwrap payloads stored as JSON text into the document they contain.
fn as_document(payload: &Value) -> Result<Value, PayloadFormatError> {
    let document = match payload {
        Value::String(text) => serde_json::from_str(text)?,
        other => other.clone(),
    };

    if document.is_object() {
        Ok(document)
    } else {
        Err(PayloadFormatError::NotAnObject)
    }
}

impl AccelerometerPayload {
    /// Decode an accelerometer payload.
    pub fn decode(payload: &Value) -> Result<Self, PayloadFormatError> {
        let fields: AccelerometerFields = serde_json::from_value(as_document(payload)?)?;

        let enriched = fields.movement_detected.is_some()
            || fields.movement_magnitude.is_some()
            || fields.movement_delta.is_some();
        if enriched {
            return Ok(AccelerometerPayload::Enriched {
                movement_detected: fields.movement_detected.unwrap_or(false),
                movement_magnitude: fields.movement_magnitude.unwrap_or(0.0),
                movement_delta: fields.movement_delta.unwrap_or(0.0),
            });
        }

        if fields.x.is_some() || fields.y.is_some() || fields.z.is_some() {
            return Ok(AccelerometerPayload::Axes {
                x: fields.x.unwrap_or(0.0),
                y: fields.y.unwrap_or(0.0),
                z: fields.z.unwrap_or(0.0),
            });
        }

        Err(PayloadFormatError::NoMovementFields)
    }

    /// Scalar movement score of this reading.
    ///
    /// Enriched readings weight detected movement above the plain delta. Axis
    /// readings score their Euclidean magnitude, or zero when the fallback is
    /// disabled.
    pub fn movement_score(&self, config: &PipelineConfig) -> f64 {
        match *self {
            AccelerometerPayload::Enriched {
                movement_detected: true,
                movement_magnitude,
                ..
            } => movement_magnitude * config.detected_movement_weight,
            AccelerometerPayload::Enriched { movement_delta, .. } => {
                movement_delta * config.movement_delta_weight
            }
            AccelerometerPayload::Axes { x, y, z } if config.axis_magnitude_fallback => {
                (x * x + y * y + z * z).sqrt()
            }
            AccelerometerPayload::Axes { .. } => 0.0,
        }
    }
}

impl HeartRatePayload {
    /// Decode a heart rate payload.
    pub fn decode(payload: &Value) -> Result<Self, PayloadFormatError> {
        Ok(serde_json::from_value(as_document(payload)?)?)
    }
}
