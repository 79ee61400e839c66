//! Audio chunk validation (C1).
//!
//! Provides the chunk type exchanged between the transport and the session
//! buffer, and the pure validation function applied before anything is
//! buffered.

pub mod types;
pub mod validator;

pub use types::{AudioChunk, AudioValidationError};
pub use validator::validate;
