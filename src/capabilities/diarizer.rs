//! Speaker diarization capability.
//!
//! `diarize(segments, samples) -> segments`. Adds a `speaker` label to every
//! segment. When unavailable, returns inputs with a default label
//! (spec §4.3) rather than failing the pipeline.

use async_trait::async_trait;

use super::CapabilityError;
use crate::wire::Segment;

#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(
        &self,
        segments: Vec<Segment>,
        samples: &[f32],
    ) -> Result<Vec<Segment>, CapabilityError>;
}
