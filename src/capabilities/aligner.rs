//! Alignment capability.
//!
//! `align(segments, samples) -> segments`. Must be a pure function of its
//! inputs; if unavailable, returns inputs unchanged (spec §4.3).

use async_trait::async_trait;

use super::CapabilityError;
use crate::wire::Segment;

#[async_trait]
pub trait Aligner: Send + Sync {
    /// Refines word-level timings. On failure the pipeline degrades to the
    /// recognizer's own segments (spec §4.4 step 3), so implementations may
    /// return `Err` freely. This trait makes no silent-degradation promise
    /// itself, unlike [`super::Corrector`].
    async fn align(
        &self,
        segments: Vec<Segment>,
        samples: &[f32],
    ) -> Result<Vec<Segment>, CapabilityError>;
}
