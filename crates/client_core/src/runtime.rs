//! Single-task queue that serializes presentation intents and transport
//! events onto a [`SessionController`].

use std::time::Duration;

use shared::{AngleCommand, Preset};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    error::SessionError,
    session::{SessionController, SessionEvent, SessionSnapshot, DEFAULT_DEVICE_LABEL},
    transport::{TransportAdapter, TransportEventReceiver, TransportEventSender, WsTransport},
};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub device_label: String,
    /// Pause before a preset is queued. Cosmetic debouncing only.
    pub preset_delay: Duration,
    pub command_queue_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device_label: DEFAULT_DEVICE_LABEL.to_string(),
            preset_delay: Duration::from_millis(50),
            command_queue_depth: 64,
        }
    }
}

pub enum SessionCommand {
    Connect {
        endpoint: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SetAngle {
        angle: f64,
        reply: oneshot::Sender<Result<AngleCommand, SessionError>>,
    },
}

impl SessionCommand {
    fn name(&self) -> &'static str {
        match self {
            SessionCommand::Connect { .. } => "connect",
            SessionCommand::Disconnect { .. } => "disconnect",
            SessionCommand::SetAngle { .. } => "set_angle",
        }
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    preset_delay: Duration,
}

impl SessionHandle {
    pub async fn connect(&self, endpoint: impl Into<String>) -> Result<(), SessionError> {
        let endpoint = endpoint.into();
        self.request(|reply| SessionCommand::Connect { endpoint, reply }).await?
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Disconnect { reply }).await
    }

    pub async fn set_angle(&self, angle: f64) -> Result<AngleCommand, SessionError> {
        self.request(|reply| SessionCommand::SetAngle { angle, reply }).await?
    }

    pub async fn apply_preset(&self, preset: Preset) -> Result<AngleCommand, SessionError> {
        if !self.preset_delay.is_zero() {
            tokio::time::sleep(self.preset_delay).await;
        }
        self.set_angle(preset.angle()).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> Result<R, SessionError> {
        let (reply, response) = oneshot::channel();
        let command = build(reply);
        debug!(command = command.name(), "queued session command");
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)
    }
}

/// Starts a session backed by [`WsTransport`].
pub fn spawn_session(options: SessionOptions) -> (SessionHandle, JoinHandle<()>) {
    spawn_session_with(options, WsTransport::new)
}

/// Starts a session with a caller-supplied transport. The closure receives
/// the sender the transport must report its events on.
pub fn spawn_session_with<T, F>(
    options: SessionOptions,
    make_transport: F,
) -> (SessionHandle, JoinHandle<()>)
where
    T: TransportAdapter,
    F: FnOnce(TransportEventSender) -> T,
{
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(make_transport(event_tx), options.device_label);
    let (command_tx, command_rx) = mpsc::channel(options.command_queue_depth.max(1));

    let handle = SessionHandle {
        commands: command_tx,
        snapshots: controller.subscribe(),
        events: controller.event_sender(),
        preset_delay: options.preset_delay,
    };
    let task = tokio::spawn(run_session(controller, command_rx, event_rx));
    (handle, task)
}

async fn run_session<T: TransportAdapter>(
    mut controller: SessionController<T>,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut transport_events: TransportEventReceiver,
) {
    info!("session runtime started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => dispatch(&mut controller, command),
                None => break,
            },
            Some(event) = transport_events.recv() => controller.on_transport_event(event),
        }
    }
    controller.disconnect();
    info!("session runtime stopped");
}

fn dispatch<T: TransportAdapter>(controller: &mut SessionController<T>, command: SessionCommand) {
    match command {
        SessionCommand::Connect { endpoint, reply } => {
            let _ = reply.send(controller.connect(&endpoint));
        }
        SessionCommand::Disconnect { reply } => {
            controller.disconnect();
            let _ = reply.send(());
        }
        SessionCommand::SetAngle { angle, reply } => {
            let _ = reply.send(controller.set_angle(angle));
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
