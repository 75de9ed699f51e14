use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("endpoint address is empty")]
    Empty,
    #[error("endpoint address is malformed: {0}")]
    Malformed(String),
    #[error("unsupported endpoint scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),
    #[error("endpoint address has no host")]
    MissingHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("angle {angle} is outside the supported range 0..=90 degrees")]
pub struct AngleRangeError {
    pub angle: f64,
}

/// Reason an inbound frame carried no usable telemetry.
///
/// The wire may carry frames that do not belong to this protocol, so callers
/// drop these frames instead of surfacing them.
#[derive(Debug, Error)]
pub enum TelemetryDecodeError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a json object")]
    NotAnObject,
    #[error("frame has no angle field")]
    MissingAngle,
    #[error("frame angle is not a number")]
    NonNumericAngle,
}
