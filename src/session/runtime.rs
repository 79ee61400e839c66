//! Session Runtime (C5)
//!
//! One task per accepted connection: the state machine and main loop of
//! spec §4.5. Transport-agnostic by design: `FrameSource`/`FrameSink` are
//! the only seam to the wire, so the whole runtime can be driven over
//! in-memory channels in tests, matching SPEC_FULL §6's "wire-framing
//! library is out of scope, interfaces only" scoping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{validate, AudioChunk};
use crate::config::ServerConfig;
use crate::pipeline::{PipelineError, TranscriptionPipeline, TranscriptionResult};
use crate::session::buffer::{BufferId, SessionBuffer};
use crate::session::registry::SessionRegistry;
use crate::wire::{ClientFrame, ErrorCode, ServerMessage};

/// CONNECTING -> OPEN -> CLOSED (spec §4.5). Tracked only for observability;
/// the loop's own control flow is the actual state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Inbound half of a transport: yields frames until the connection closes.
#[async_trait]
pub trait FrameSource: Send {
    async fn recv(&mut self) -> Option<ClientFrame>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
}

/// Outbound half of a transport. Owned exclusively by the forward task
/// spawned in [`SessionTask::run`] so writes are never interleaved
/// (spec §5; grounded on `remotemedia-sdk`'s WebSocket signaling handler,
/// which dedicates one task to the socket's write half for the same reason).
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError>;
}

pub struct SessionTask {
    session_id: String,
    config: Arc<ServerConfig>,
    pipeline: Arc<TranscriptionPipeline>,
    registry: Arc<SessionRegistry>,
}

impl SessionTask {
    pub fn new(
        config: Arc<ServerConfig>,
        pipeline: Arc<TranscriptionPipeline>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            config,
            pipeline,
            registry,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Runs the session to completion: registers in C6, sends the
    /// handshake, loops on inbound frames until disconnect or an
    /// unrecoverable send failure, then deregisters (spec §4.5).
    pub async fn run(self, mut source: impl FrameSource, sink: impl FrameSink + 'static) {
        self.registry.insert(self.session_id.clone());
        tracing::info!(session_id = %self.session_id, "session opened");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(64);

        // Single writer task: the only place `FrameSink::send` is called
        // from, so concurrent writes from the main loop and background
        // final tasks can never interleave on the wire.
        let forward_handle = tokio::spawn(async move {
            let mut sink = sink;
            while let Some(message) = outbound_rx.recv().await {
                if let Err(error) = sink.send(message).await {
                    tracing::debug!(%error, "outbound send failed, closing writer");
                    break;
                }
            }
        });

        let handshake = ServerMessage::ConnectionEstablished {
            message: "connected".to_string(),
            session_id: self.session_id.clone(),
        };
        if outbound_tx.send(handshake).await.is_err() {
            self.registry.remove(&self.session_id);
            let _ = forward_handle.await;
            return;
        }

        let mut buffer = SessionBuffer::new(&self.config);

        loop {
            let frame = match source.recv().await {
                Some(frame) => frame,
                None => break,
            };

            match frame {
                ClientFrame::Text(_) => {
                    let message = ServerMessage::Error {
                        code: ErrorCode::InvalidFormat,
                        message: "text frames are not supported".to_string(),
                    };
                    if outbound_tx.send(message).await.is_err() {
                        break;
                    }
                    continue;
                }
                ClientFrame::Binary(bytes) => {
                    let chunk = AudioChunk::new(bytes);
                    if let Err(error) = validate(&chunk, self.config.max_buffer_bytes()) {
                        let message = ServerMessage::Error {
                            code: ErrorCode::InvalidFormat,
                            message: error.to_string(),
                        };
                        if outbound_tx.send(message).await.is_err() {
                            break;
                        }
                        continue;
                    }

                    let bytes_received = chunk.len();
                    let samples = chunk.as_samples();
                    buffer.append(chunk.as_bytes());

                    // Silence tracking informs `should_flush`'s threshold
                    // branch (spec §4.2); a cheap energy check stands in for
                    // the VAD hint / inactivity timer the spec allows,
                    // without an extra GPU round trip per chunk.
                    if is_silent(&samples) {
                        let chunk_duration = Duration::from_secs_f64(
                            bytes_received as f64 / crate::config::BYTES_PER_SECOND as f64,
                        );
                        buffer.track_silence(chunk_duration);
                    } else {
                        buffer.reset_silence();
                    }

                    let ack = ServerMessage::AudioReceived { bytes_received };
                    if outbound_tx.send(ack).await.is_err() {
                        break;
                    }
                }
            }

            if !buffer.should_flush() {
                continue;
            }

            let (bytes, buffer_id, start_time) = buffer.flush();
            let samples = AudioChunk::new(bytes).as_samples();

            match self
                .pipeline
                .process_partial(&samples, buffer_id.clone(), start_time)
                .await
            {
                Ok(outcome) => {
                    if outbound_tx
                        .send(to_wire(outcome.result, WireKind::Partial))
                        .await
                        .is_err()
                    {
                        break;
                    }

                    if let Some(recognizer_output) = outcome.recognizer_output {
                        spawn_final(
                            self.pipeline.clone(),
                            outbound_tx.clone(),
                            recognizer_output,
                            samples,
                            buffer_id,
                        );
                    }
                }
                Err(PipelineError::GpuOom { message }) => {
                    let message = ServerMessage::Error {
                        code: ErrorCode::GpuOom,
                        message,
                    };
                    if outbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(PipelineError::Internal { message }) => {
                    let message = ServerMessage::Error {
                        code: ErrorCode::Internal,
                        message,
                    };
                    if outbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
            }
        }

        drop(outbound_tx);
        let _ = forward_handle.await;
        self.registry.remove(&self.session_id);
        tracing::info!(session_id = %self.session_id, "session closed");
    }
}

/// Spawns the detached background task for `process_final` (spec §4.5 step
/// 4, §9's "coroutine background work becomes an explicit spawned task").
/// The main loop does not await this handle; a closed outbound channel just
/// means the send below fails and the result is logged and dropped.
fn spawn_final(
    pipeline: Arc<TranscriptionPipeline>,
    outbound_tx: mpsc::Sender<ServerMessage>,
    recognizer_output: crate::capabilities::RecognizerOutput,
    samples: Vec<f32>,
    buffer_id: BufferId,
) {
    tokio::spawn(async move {
        let result = pipeline
            .process_final(recognizer_output, &samples, buffer_id.clone())
            .await;
        if outbound_tx
            .send(to_wire(result, WireKind::Final))
            .await
            .is_err()
        {
            tracing::debug!(buffer_id = %buffer_id, "final result dropped: connection closed");
        }
    });
}

/// RMS energy below which an inbound chunk counts toward the silence
/// counter. Distinct from (and coarser than) any real VAD's own threshold;
/// this only drives the flush-trigger heuristic, never a hallucination gate.
const SILENCE_RMS_THRESHOLD: f32 = 1e-4;

fn is_silent(samples: &[f32]) -> bool {
    if samples.is_empty() {
        return true;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt() <= SILENCE_RMS_THRESHOLD
}

enum WireKind {
    Partial,
    Final,
}

fn to_wire(result: TranscriptionResult, kind: WireKind) -> ServerMessage {
    let TranscriptionResult {
        buffer_id,
        text,
        segments,
        timestamp_range,
        latency_ms,
    } = result;
    let buffer_id = buffer_id.as_str().to_string();
    match kind {
        WireKind::Partial => ServerMessage::Partial {
            buffer_id,
            text,
            segments,
            timestamp_range,
            latency_ms,
        },
        WireKind::Final => ServerMessage::Final {
            buffer_id,
            text,
            segments,
            timestamp_range,
            latency_ms,
        },
    }
}

/// An in-memory transport for exercising [`SessionTask`] without a network
/// socket (SPEC_FULL §6). Enabled for this crate's own unit tests and for
/// the `tests/` integration suite via the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod testing {

    use super::*;

    pub struct ChannelSource {
        rx: mpsc::Receiver<ClientFrame>,
    }

    #[async_trait]
    impl FrameSource for ChannelSource {
        async fn recv(&mut self) -> Option<ClientFrame> {
            self.rx.recv().await
        }
    }

    pub struct ChannelSink {
        tx: mpsc::Sender<ServerMessage>,
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
            self.tx.send(message).await.map_err(|_| TransportError::Closed)
        }
    }

    /// Returns `(client_tx, source, sink, server_rx)`: send `ClientFrame`s
    /// into `client_tx` and read `ServerMessage`s out of `server_rx`.
    pub fn channel_transport() -> (
        mpsc::Sender<ClientFrame>,
        ChannelSource,
        ChannelSink,
        mpsc::Receiver<ServerMessage>,
    ) {
        let (client_tx, client_rx) = mpsc::channel(64);
        let (server_tx, server_rx) = mpsc::channel(64);
        (
            client_tx,
            ChannelSource { rx: client_rx },
            ChannelSink { tx: server_tx },
            server_rx,
        )
    }
}
