use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{
    domain::check_angle,
    error::{AngleRangeError, TelemetryDecodeError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceCommand {
    SetAngle(AngleCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleCommand {
    #[serde(serialize_with = "serialize_degrees")]
    pub angle: f64,
    /// ISO-8601 wall-clock time the command was issued, millisecond precision.
    pub timestamp: String,
}

impl AngleCommand {
    pub fn new(angle: f64, issued_at: DateTime<Utc>) -> Result<Self, AngleRangeError> {
        let angle = check_angle(angle)?;
        Ok(Self {
            angle,
            timestamp: issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub fn now(angle: f64) -> Result<Self, AngleRangeError> {
        Self::new(angle, Utc::now())
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(&DeviceCommand::SetAngle(self.clone()))
    }
}

// Whole degrees go out as integers (`45`, not `45.0`).
fn serialize_degrees<S: Serializer>(angle: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if angle.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(angle) {
        serializer.serialize_u32(*angle as u32)
    } else {
        serializer.serialize_f64(*angle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub angle: f64,
}

impl TelemetryFrame {
    pub fn decode(raw: &str) -> Result<Self, TelemetryDecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(fields) = value else {
            return Err(TelemetryDecodeError::NotAnObject);
        };

        match fields.get("angle") {
            None | Some(Value::Null) => Err(TelemetryDecodeError::MissingAngle),
            Some(angle) => angle
                .as_f64()
                .map(|angle| Self { angle })
                .ok_or(TelemetryDecodeError::NonNumericAngle),
        }
    }

    pub fn to_frame(&self) -> String {
        serde_json::json!({ "angle": self.angle }).to_string()
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
