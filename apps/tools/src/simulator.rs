use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use shared::{DeviceCommand, TelemetryFrame};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub lag: Duration,
    pub offset: f64,
}

impl DeviceConfig {
    pub fn new(lag_ms: u64, offset: f64) -> Self {
        Self {
            lag: Duration::from_millis(lag_ms),
            offset,
        }
    }
}

/// Actuator position shared by every connection to the simulator.
#[derive(Clone)]
pub struct DeviceState {
    config: DeviceConfig,
    angle: Arc<Mutex<f64>>,
}

impl DeviceState {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            angle: Arc::new(Mutex::new(0.0)),
        }
    }

    pub async fn angle(&self) -> f64 {
        *self.angle.lock().await
    }

    async fn handle_frame(&self, text: &str) -> Option<TelemetryFrame> {
        match serde_json::from_str::<DeviceCommand>(text) {
            Ok(DeviceCommand::SetAngle(command)) => {
                info!(angle = command.angle, timestamp = %command.timestamp, "device: setAngle");
                let reported = command.angle + self.config.offset;
                *self.angle.lock().await = reported;
                Some(TelemetryFrame { angle: reported })
            }
            Err(err) => {
                debug!(error = %err, "device: ignoring frame");
                None
            }
        }
    }
}

pub fn router(state: DeviceState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DeviceState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: DeviceState, mut socket: WebSocket) {
    info!("device: controller connected");
    let current = TelemetryFrame {
        angle: state.angle().await,
    };
    if socket.send(Message::Text(current.to_frame())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let Some(reply) = state.handle_frame(&text).await else {
                    continue;
                };
                if !state.config.lag.is_zero() {
                    tokio::time::sleep(state.config.lag).await;
                }
                if socket.send(Message::Text(reply.to_frame())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!("device: controller disconnected");
}

#[cfg(test)]
#[path = "tests/simulator_tests.rs"]
mod tests;
