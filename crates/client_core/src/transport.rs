//! Link layer: one WebSocket connection per handle, surfaced as an ordered event stream.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use futures::{SinkExt, StreamExt};
use shared::Endpoint;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::TransportError;

pub type HandleId = u64;

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHandle {
    id: HandleId,
    endpoint: Endpoint,
}

impl TransportHandle {
    pub fn new(id: HandleId, endpoint: Endpoint) -> Self {
        Self { id, endpoint }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    Error(String),
    Closed,
    Message(String),
}

impl TransportEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEventKind::Error(_) | TransportEventKind::Closed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub handle: HandleId,
    pub kind: TransportEventKind,
}

/// Owner-facing surface of a connection provider.
///
/// Implementations report outcomes through the event sender they were built
/// with; none of these calls wait on the network.
pub trait TransportAdapter: Send + 'static {
    /// Validates `endpoint` and starts connecting. Fails before any network
    /// activity when the address is empty or malformed.
    fn open(&mut self, endpoint: &str) -> Result<TransportHandle, TransportError>;

    fn send(&mut self, handle: &TransportHandle, payload: String) -> Result<(), TransportError>;

    /// Tears the link down. Safe to call repeatedly; the handle still
    /// produces exactly one terminal event.
    fn close(&mut self, handle: &TransportHandle);
}

enum LinkState {
    Pending,
    Open(mpsc::UnboundedSender<Message>),
    Closing,
}

struct Link {
    id: HandleId,
    state: Mutex<LinkState>,
    terminated: AtomicBool,
    shutdown: Notify,
    events: TransportEventSender,
}

impl Link {
    fn new(id: HandleId, events: TransportEventSender) -> Self {
        Self {
            id,
            state: Mutex::new(LinkState::Pending),
            terminated: AtomicBool::new(false),
            shutdown: Notify::new(),
            events,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: TransportEventKind) {
        if kind.is_terminal() {
            if self.terminated.swap(true, Ordering::AcqRel) {
                return;
            }
        } else if self.terminated.load(Ordering::Acquire) {
            return;
        }
        let _ = self.events.send(TransportEvent {
            handle: self.id,
            kind,
        });
    }

    /// Moves a pending link to open. Returns false when a close raced the handshake.
    fn promote(&self, writer: mpsc::UnboundedSender<Message>) -> bool {
        let mut state = self.lock_state();
        if matches!(*state, LinkState::Pending) {
            *state = LinkState::Open(writer);
            true
        } else {
            false
        }
    }

    fn writer(&self) -> Option<mpsc::UnboundedSender<Message>> {
        match &*self.lock_state() {
            LinkState::Open(writer) => Some(writer.clone()),
            _ => None,
        }
    }

    fn request_close(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), LinkState::Closing);
        if !matches!(previous, LinkState::Closing) {
            self.shutdown.notify_one();
        }
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

pub struct WsTransport {
    events: TransportEventSender,
    next_id: HandleId,
    links: HashMap<HandleId, Arc<Link>>,
}

impl WsTransport {
    pub fn new(events: TransportEventSender) -> Self {
        Self {
            events,
            next_id: 1,
            links: HashMap::new(),
        }
    }
}

impl TransportAdapter for WsTransport {
    fn open(&mut self, endpoint: &str) -> Result<TransportHandle, TransportError> {
        let endpoint = Endpoint::parse(endpoint)?;
        self.links.retain(|_, link| !link.is_terminated());

        let id = self.next_id;
        self.next_id += 1;

        let link = Arc::new(Link::new(id, self.events.clone()));
        self.links.insert(id, Arc::clone(&link));
        info!(handle = id, endpoint = %endpoint, "transport: opening link");
        tokio::spawn(run_link(link, endpoint.url().to_string()));

        Ok(TransportHandle::new(id, endpoint))
    }

    fn send(&mut self, handle: &TransportHandle, payload: String) -> Result<(), TransportError> {
        let writer = self
            .links
            .get(&handle.id)
            .and_then(|link| link.writer())
            .ok_or(TransportError::NotOpen(handle.id))?;
        writer
            .send(Message::Text(payload))
            .map_err(|_| TransportError::NotOpen(handle.id))
    }

    fn close(&mut self, handle: &TransportHandle) {
        match self.links.remove(&handle.id) {
            Some(link) => {
                debug!(handle = handle.id, "transport: close requested");
                link.request_close();
            }
            None => debug!(handle = handle.id, "transport: close on released link ignored"),
        }
    }
}

async fn run_link(link: Arc<Link>, url: String) {
    let connected = tokio::select! {
        _ = link.shutdown.notified() => None,
        result = connect_async(url.as_str()) => Some(result),
    };

    let stream = match connected {
        None => {
            debug!(handle = link.id, "transport: closed before handshake completed");
            link.emit(TransportEventKind::Closed);
            return;
        }
        Some(Err(err)) => {
            warn!(handle = link.id, error = %err, "transport: connect failed");
            link.emit(TransportEventKind::Error(err.to_string()));
            return;
        }
        Some(Ok((stream, _))) => stream,
    };

    let (mut sink, mut source) = stream.split();
    let (writer, mut outbound) = mpsc::unbounded_channel::<Message>();
    if !link.promote(writer) {
        let _ = sink.close().await;
        link.emit(TransportEventKind::Closed);
        return;
    }
    info!(handle = link.id, "transport: link open");
    link.emit(TransportEventKind::Opened);

    let terminal = loop {
        tokio::select! {
            _ = link.shutdown.notified() => {
                let _ = sink.send(Message::Close(None)).await;
                break TransportEventKind::Closed;
            }
            Some(frame) = outbound.recv() => {
                if let Err(err) = sink.send(frame).await {
                    warn!(handle = link.id, error = %err, "transport: send failed");
                    break TransportEventKind::Error(err.to_string());
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => link.emit(TransportEventKind::Message(text)),
                Some(Ok(Message::Close(_))) | None => break TransportEventKind::Closed,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(handle = link.id, error = %err, "transport: receive failed");
                    break TransportEventKind::Error(err.to_string());
                }
            },
        }
    };

    info!(handle = link.id, "transport: link finished");
    link.emit(terminal);
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
