//! Real-time audio transcription server.
//!
//! Per-connection streaming sessions buffer inbound audio, flush into a
//! two-phase recognition pipeline (fast `partial`, slower `final` sharing
//! the same buffer id), and deliver results back over a swappable
//! transport. See `capabilities` for the opaque GPU-backed inference
//! contracts, `session` for the per-connection runtime, and `pipeline` for
//! the orchestration between them.

pub mod audio;
pub mod capabilities;
pub mod config;
pub mod pipeline;
pub mod resource;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::ServerConfig;
pub use pipeline::TranscriptionPipeline;
pub use resource::ResourceSupervisor;
pub use session::{SessionRegistry, SessionTask};
