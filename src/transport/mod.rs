//! External transport binding (spec §6).
//!
//! The session runtime only knows about [`crate::session::runtime::FrameSource`]
//! and [`crate::session::runtime::FrameSink`]; this module is the one place
//! that speaks an actual wire protocol (axum WebSockets) and a process
//! health surface, both scoped as external collaborators by the spec.

pub mod ws;

pub use ws::{router, ServerState};
