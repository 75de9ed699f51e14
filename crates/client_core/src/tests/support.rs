use std::{collections::HashSet, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use shared::Endpoint;
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};

use crate::{
    error::TransportError,
    transport::{
        HandleId, TransportAdapter, TransportEvent, TransportEventKind, TransportEventReceiver,
        TransportHandle,
    },
};

pub const WAIT: Duration = Duration::from_secs(5);

/// In-memory transport that records every call and never touches the network.
#[derive(Default)]
pub struct RecordingTransport {
    next_id: HandleId,
    pub opened: Vec<String>,
    pub sent: Vec<(HandleId, String)>,
    pub closed: Vec<HandleId>,
    released: HashSet<HandleId>,
}

impl TransportAdapter for RecordingTransport {
    fn open(&mut self, endpoint: &str) -> Result<TransportHandle, TransportError> {
        let endpoint = Endpoint::parse(endpoint)?;
        self.next_id += 1;
        self.opened.push(endpoint.as_str().to_string());
        Ok(TransportHandle::new(self.next_id, endpoint))
    }

    fn send(&mut self, handle: &TransportHandle, payload: String) -> Result<(), TransportError> {
        if self.released.contains(&handle.id()) {
            return Err(TransportError::NotOpen(handle.id()));
        }
        self.sent.push((handle.id(), payload));
        Ok(())
    }

    fn close(&mut self, handle: &TransportHandle) {
        self.closed.push(handle.id());
        self.released.insert(handle.id());
    }
}

impl RecordingTransport {
    /// Makes later sends on `id` fail as if the peer had already gone away.
    pub fn drop_link(&mut self, id: HandleId) {
        self.released.insert(id);
    }
}

pub fn event(handle: HandleId, kind: TransportEventKind) -> TransportEvent {
    TransportEvent { handle, kind }
}

pub async fn next_event(events: &mut TransportEventReceiver) -> TransportEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("transport event in time")
        .expect("transport event channel open")
}

/// How the fake device answers text frames.
#[derive(Clone)]
pub enum DeviceBehavior {
    /// Sends every text frame straight back.
    Echo,
    /// Answers every text frame with the same fixed frame.
    Reply(String),
    /// Closes the socket right after the upgrade.
    CloseImmediately,
}

#[derive(Clone)]
struct DeviceState {
    behavior: DeviceBehavior,
    received: mpsc::UnboundedSender<String>,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<()>>>>,
}

pub struct FakeDevice {
    pub endpoint: String,
    pub received: mpsc::UnboundedReceiver<String>,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<()>>>>,
}

impl FakeDevice {
    /// Asks every connected socket to close from the device side.
    pub async fn close_all(&self) {
        for peer in self.peers.lock().await.iter() {
            let _ = peer.send(());
        }
    }

    pub async fn next_frame(&mut self) -> String {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("device frame in time")
            .expect("device channel open")
    }
}

pub async fn spawn_device(behavior: DeviceBehavior) -> Result<FakeDevice> {
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let peers = Arc::new(Mutex::new(Vec::new()));
    let state = DeviceState {
        behavior,
        received: received_tx,
        peers: Arc::clone(&peers),
    };
    let app = Router::new().route("/", get(device_ws)).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(FakeDevice {
        endpoint: format!("ws://{addr}/"),
        received: received_rx,
        peers,
    })
}

/// An address nothing listens on.
pub async fn unused_endpoint() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    drop(listener);
    Ok(format!("ws://{addr}/"))
}

async fn device_ws(ws: WebSocketUpgrade, State(state): State<DeviceState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| device_connection(state, socket))
}

async fn device_connection(state: DeviceState, mut socket: WebSocket) {
    if matches!(state.behavior, DeviceBehavior::CloseImmediately) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    state.peers.lock().await.push(close_tx);

    loop {
        tokio::select! {
            _ = close_rx.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.received.send(text.clone());
                    let reply = match &state.behavior {
                        DeviceBehavior::Echo => text,
                        DeviceBehavior::Reply(frame) => frame.clone(),
                        DeviceBehavior::CloseImmediately => break,
                    };
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
