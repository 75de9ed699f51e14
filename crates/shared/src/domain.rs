use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AngleRangeError, EndpointError};

pub const MIN_ANGLE: f64 = 0.0;
pub const MAX_ANGLE: f64 = 90.0;

pub fn check_angle(angle: f64) -> Result<f64, AngleRangeError> {
    if angle.is_finite() && (MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
        Ok(angle)
    } else {
        Err(AngleRangeError { angle })
    }
}

pub fn clamp_angle(angle: f64) -> f64 {
    if angle.is_nan() {
        return MIN_ANGLE;
    }
    angle.clamp(MIN_ANGLE, MAX_ANGLE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn is_idle(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    url: Url,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EndpointError::Empty);
        }

        let url = Url::parse(raw).map_err(|err| EndpointError::Malformed(err.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(EndpointError::MissingHost);
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WingAngleState {
    pub commanded: f64,
    pub reported: Option<f64>,
}

impl WingAngleState {
    pub fn displayed(&self) -> f64 {
        self.reported.unwrap_or(self.commanded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Flat,
    Shallow,
    Mid,
    Vertical,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Flat, Preset::Shallow, Preset::Mid, Preset::Vertical];

    pub fn angle(self) -> f64 {
        match self {
            Preset::Flat => 0.0,
            Preset::Shallow => 15.0,
            Preset::Mid => 45.0,
            Preset::Vertical => 90.0,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.angle() == f64::from(degrees))
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
