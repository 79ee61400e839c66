//! Text correction capability.
//!
//! `correct(text, segments) -> {text, segments}`. Applies text-level
//! correction (homophone disambiguation, filler removal, punctuation). On
//! connection/availability failure the caller must degrade gracefully:
//! return inputs unchanged, marked as uncorrected, and log a warning.
//! Correction failure must never surface as a pipeline failure (spec §4.3).

use async_trait::async_trait;

use super::CapabilityError;
use crate::wire::Segment;

#[async_trait]
pub trait Corrector: Send + Sync {
    async fn correct(
        &self,
        text: String,
        segments: Vec<Segment>,
    ) -> Result<(String, Vec<Segment>), CapabilityError>;
}
