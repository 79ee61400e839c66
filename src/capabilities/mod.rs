//! Model Capabilities (C3)
//!
//! Five opaque, swappable inference components exposed to the pipeline
//! through narrow trait contracts (spec §4.3). Each trait has exactly one
//! production implementation (a thin wrapper the pipeline treats as opaque)
//! and one deterministic mock implementation under [`mock`]. This is the
//! Rust form of spec §9's "mock capability implementations must be
//! alternate implementations of the same capability interface", rather
//! than conditional branches inside the pipeline.

pub mod aligner;
pub mod corrector;
pub mod diarizer;
pub mod mock;
pub mod recognizer;
pub mod vad;

pub use aligner::Aligner;
pub use corrector::Corrector;
pub use diarizer::Diarizer;
pub use recognizer::{Recognizer, RecognizerOutput};
pub use vad::{SpeechSpan, VoiceActivityDetector};

use thiserror::Error;

/// Uniform error surface across all five capabilities (spec §4.3).
///
/// Every capability has two failure modes: recoverable (retry next buffer)
/// and fatal at load time (server refuses to start). `Oom` is always
/// recoverable and is handled specially by the resource supervisor (C7).
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("GPU out of memory: {message}")]
    Oom { message: String },

    #[error("capability unavailable: {message}")]
    Unavailable { message: String },

    #[error("capability processing failed: {message}")]
    Internal { message: String },

    #[error("capability failed to load: {message}")]
    FatalAtLoad { message: String },
}

impl CapabilityError {
    /// `Oom` and `Unavailable`/`Internal` failures are per-buffer faults the
    /// caller can recover from; only `FatalAtLoad` refuses server startup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CapabilityError::FatalAtLoad { .. })
    }
}

/// A complete set of capability implementations, constructed once at boot
/// and shared by `Arc` across all sessions (spec §9: "explicit process-scoped
/// state held by a supervisor object constructed at boot, passed to session
/// handlers by reference" rather than a module-level singleton).
pub struct Capabilities {
    pub vad: Box<dyn VoiceActivityDetector>,
    pub recognizer: Box<dyn Recognizer>,
    pub aligner: Box<dyn Aligner>,
    pub diarizer: Box<dyn Diarizer>,
    pub corrector: Box<dyn Corrector>,
}

impl Capabilities {
    /// Wires the deterministic mock implementations, the default for
    /// development and for this crate's own test suite, since the real
    /// GPU-backed models are out of scope for the core (spec §1).
    pub fn mock() -> Self {
        Self {
            vad: Box::new(mock::MockVad::always_speech()),
            recognizer: Box::new(mock::MockRecognizer::default()),
            aligner: Box::new(mock::IdentityAligner),
            diarizer: Box::new(mock::DefaultSpeakerDiarizer),
            corrector: Box::new(mock::PassthroughCorrector),
        }
    }
}
