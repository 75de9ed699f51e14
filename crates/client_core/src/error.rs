use shared::error::{AngleRangeError, EndpointError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
    #[error("link {0} is not open")]
    NotOpen(u64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(EndpointError),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    OutOfRange(#[from] AngleRangeError),
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("already connected")]
    AlreadyConnected,
    #[error("failed to encode command: {0}")]
    Encode(String),
    #[error("session runtime has shut down")]
    SessionClosed,
}

impl From<TransportError> for SessionError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::InvalidEndpoint(err) => SessionError::InvalidEndpoint(err),
            TransportError::NotOpen(_) => SessionError::NotConnected,
        }
    }
}
