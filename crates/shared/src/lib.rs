//! Wire protocol and domain types shared by the wing-angle client and tools.

pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{ConnectionState, Endpoint, Preset, WingAngleState, MAX_ANGLE, MIN_ANGLE};
pub use protocol::{AngleCommand, DeviceCommand, TelemetryFrame};
