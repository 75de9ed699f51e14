//! Connection state machine and angle reconciliation.
//!
//! [`SessionController`] is synchronous: every intent and every transport
//! event is applied to completion before the next one. The runtime in
//! [`crate::runtime`] provides the single queue that feeds it.

use shared::{
    error::EndpointError, AngleCommand, ConnectionState, Endpoint, Preset, TelemetryFrame,
    WingAngleState,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    transport::{HandleId, TransportAdapter, TransportEvent, TransportEventKind, TransportHandle},
};

pub const DEFAULT_DEVICE_LABEL: &str = "SORDA-air";

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub angles: WingAngleState,
    pub endpoint: Option<Endpoint>,
    pub feedback: Option<String>,
}

impl SessionSnapshot {
    pub fn displayed_angle(&self) -> f64 {
        self.angles.displayed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Feedback(String),
    CommandSent(AngleCommand),
    TelemetryReceived {
        angle: f64,
    },
    Error(SessionError),
}

pub struct SessionController<T: TransportAdapter> {
    transport: T,
    device_label: String,
    connection: ConnectionState,
    link: Option<TransportHandle>,
    closing: Option<HandleId>,
    endpoint: Option<Endpoint>,
    angles: WingAngleState,
    feedback: Option<String>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl<T: TransportAdapter> SessionController<T> {
    pub fn new(transport: T, device_label: impl Into<String>) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            device_label: device_label.into(),
            connection: ConnectionState::Disconnected,
            link: None,
            closing: None,
            endpoint: None,
            angles: WingAngleState::default(),
            feedback: None,
            snapshots,
            events,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn angles(&self) -> WingAngleState {
        self.angles
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection,
            angles: self.angles,
            endpoint: self.endpoint.clone(),
            feedback: self.feedback.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn connect(&mut self, endpoint: &str) -> Result<(), SessionError> {
        if !self.connection.is_idle() {
            let err = if self.connection.is_connected() {
                SessionError::AlreadyConnected
            } else {
                SessionError::AlreadyConnecting
            };
            return self.reject(err);
        }
        if endpoint.trim().is_empty() {
            return self.reject(SessionError::InvalidEndpoint(EndpointError::Empty));
        }

        let handle = match self.transport.open(endpoint) {
            Ok(handle) => handle,
            Err(err) => return self.reject(err.into()),
        };
        info!(
            handle = handle.id(),
            endpoint = %handle.endpoint(),
            "session: connecting"
        );
        // A late terminal event from a previously closed link must not
        // overwrite feedback for this attempt.
        self.closing = None;
        self.link = Some(handle);
        self.transition(ConnectionState::Connecting);
        self.publish();
        Ok(())
    }

    pub fn disconnect(&mut self) {
        let Some(handle) = self.link.take() else {
            debug!("session: disconnect ignored, no active link");
            return;
        };
        info!(handle = handle.id(), "session: disconnecting");
        self.transport.close(&handle);
        self.closing = Some(handle.id());
        self.endpoint = None;
        self.transition(ConnectionState::Disconnected);
        self.publish();
    }

    pub fn set_angle(&mut self, angle: f64) -> Result<AngleCommand, SessionError> {
        if !self.connection.is_connected() {
            return self.reject(SessionError::NotConnected);
        }
        let command = match AngleCommand::now(angle) {
            Ok(command) => command,
            Err(err) => return self.reject(err.into()),
        };
        let frame = match command.to_frame() {
            Ok(frame) => frame,
            Err(err) => return self.reject(SessionError::Encode(err.to_string())),
        };

        let sent = match self.link.as_ref() {
            Some(link) => self
                .transport
                .send(link, frame)
                .map_err(SessionError::from),
            None => Err(SessionError::NotConnected),
        };
        if let Err(err) = sent {
            return self.reject(err);
        }

        self.angles.commanded = command.angle;
        info!(angle = command.angle, "session: angle command sent");
        let _ = self.events.send(SessionEvent::CommandSent(command.clone()));
        self.set_feedback(format!("Wing angle set to {}°", command.angle));
        self.publish();
        Ok(command)
    }

    pub fn apply_preset(&mut self, preset: Preset) -> Result<AngleCommand, SessionError> {
        self.set_angle(preset.angle())
    }

    pub fn on_transport_event(&mut self, event: TransportEvent) {
        if self.closing == Some(event.handle) {
            if event.kind.is_terminal() {
                self.closing = None;
                self.set_feedback(format!("Disconnected from {}", self.device_label));
                self.publish();
            }
            return;
        }

        let Some(link) = self.link.as_ref().filter(|link| link.id() == event.handle) else {
            debug!(handle = event.handle, "session: ignoring event from stale link");
            return;
        };

        match (self.connection, event.kind) {
            (ConnectionState::Connecting, TransportEventKind::Opened) => {
                self.endpoint = Some(link.endpoint().clone());
                self.transition(ConnectionState::Connected);
                self.set_feedback(format!("Connected to {}", self.device_label));
                self.publish();
            }
            (ConnectionState::Connecting, TransportEventKind::Closed) => {
                self.fail_link("link closed before it opened".to_string());
            }
            (_, TransportEventKind::Error(reason)) => self.fail_link(reason),
            (ConnectionState::Connected, TransportEventKind::Closed) => {
                info!(handle = event.handle, "session: peer closed the link");
                self.link = None;
                self.endpoint = None;
                self.transition(ConnectionState::Disconnected);
                self.set_feedback(format!("Disconnected from {}", self.device_label));
                self.publish();
            }
            (ConnectionState::Connected, TransportEventKind::Message(raw)) => {
                self.apply_telemetry(&raw);
            }
            (state, kind) => {
                debug!(handle = event.handle, %state, ?kind, "session: event has no transition");
            }
        }
    }

    fn apply_telemetry(&mut self, raw: &str) {
        match TelemetryFrame::decode(raw) {
            Ok(frame) => {
                debug!(angle = frame.angle, "session: telemetry received");
                self.angles.reported = Some(frame.angle);
                let _ = self
                    .events
                    .send(SessionEvent::TelemetryReceived { angle: frame.angle });
                self.publish();
            }
            Err(err) => debug!(error = %err, "session: inbound frame ignored"),
        }
    }

    fn fail_link(&mut self, reason: String) {
        warn!(reason = %reason, "session: connection failed");
        self.link = None;
        self.endpoint = None;
        self.transition(ConnectionState::Failed);
        let _ = self
            .events
            .send(SessionEvent::Error(SessionError::Connection(reason)));
        self.set_feedback("Connection failed. Check URL and try again.".to_string());
        self.transition(ConnectionState::Disconnected);
        self.publish();
    }

    fn reject<R>(&mut self, err: SessionError) -> Result<R, SessionError> {
        warn!(error = %err, state = %self.connection, "session: intent rejected");
        let _ = self.events.send(SessionEvent::Error(err.clone()));
        self.set_feedback(self.feedback_for(&err));
        self.publish();
        Err(err)
    }

    fn feedback_for(&self, err: &SessionError) -> String {
        let label = &self.device_label;
        match err {
            SessionError::InvalidEndpoint(EndpointError::Empty) => {
                "Please enter a valid WebSocket URL".to_string()
            }
            SessionError::InvalidEndpoint(_) => "Invalid WebSocket URL format".to_string(),
            SessionError::Connection(_) => "Connection failed. Check URL and try again.".to_string(),
            SessionError::NotConnected => format!("Not connected to {label}"),
            SessionError::OutOfRange(range) => {
                format!("Wing angle must be between 0° and 90° (got {})", range.angle)
            }
            SessionError::AlreadyConnecting => format!("Already connecting to {label}"),
            SessionError::AlreadyConnected => format!("Already connected to {label}"),
            SessionError::Encode(_) => "Failed to encode wing angle command".to_string(),
            SessionError::SessionClosed => "Session has shut down".to_string(),
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.connection;
        if from == to {
            return;
        }
        self.connection = to;
        info!(%from, %to, "session: state changed");
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
    }

    fn set_feedback(&mut self, message: String) {
        let _ = self.events.send(SessionEvent::Feedback(message.clone()));
        self.feedback = Some(message);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
