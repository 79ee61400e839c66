//! axum WebSocket binding and health endpoint.
//!
//! Thin translation layer only (SPEC_FULL §6): decode `axum::extract::ws::Message`
//! into `ClientFrame`, encode `ServerMessage` into `Message::Text`. All
//! session/pipeline semantics live in [`crate::session::runtime`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::pipeline::TranscriptionPipeline;
use crate::session::registry::SessionRegistry;
use crate::session::runtime::{FrameSink, FrameSource, SessionTask, TransportError};
use crate::wire::{ClientFrame, ServerMessage};

/// Process-wide, `Arc`-shared state handed to every connection (spec §9's
/// explicit process-scoped state, constructed once in `main`).
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<TranscriptionPipeline>,
    pub registry: Arc<SessionRegistry>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (sink, source) = socket.split();
    let task = SessionTask::new(state.config, state.pipeline, state.registry);
    task.run(WsSource(source), WsSink(sink)).await;
}

#[derive(Serialize)]
struct HealthResponse {
    active_sessions: usize,
}

async fn healthz(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        active_sessions: state.registry.len(),
    })
}

struct WsSource(SplitStream<WebSocket>);

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Option<ClientFrame> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Binary(bytes))) => return Some(ClientFrame::Binary(bytes)),
                Some(Ok(Message::Text(text))) => return Some(ClientFrame::Text(text)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(error)) => {
                    tracing::debug!(%error, "websocket receive error, treating as disconnect");
                    return None;
                }
            }
        }
    }
}

struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(&message).map_err(|_| TransportError::Closed)?;
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|_| TransportError::Closed)
    }
}
