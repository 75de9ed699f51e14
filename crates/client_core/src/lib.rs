//! Session core for a single wing-angle actuator reached over WebSocket.
//!
//! Layers, lowest first: [`transport`] owns the link, [`session`] owns the
//! connection state machine and angle reconciliation, [`runtime`] serializes
//! intents and link events onto one task.

pub mod error;
pub mod runtime;
pub mod session;
pub mod transport;

pub use error::{SessionError, TransportError};
pub use runtime::{spawn_session, spawn_session_with, SessionHandle, SessionOptions};
pub use session::{SessionController, SessionEvent, SessionSnapshot, DEFAULT_DEVICE_LABEL};
pub use transport::{
    TransportAdapter, TransportEvent, TransportEventKind, TransportHandle, WsTransport,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
