//! Audio Validator (C1)
//!
//! A pure function applied to every inbound binary frame before it is ever
//! buffered. Format metadata (sample rate / channels / encoding) is *not*
//! inspected inside the chunk; those are properties of the session, not the
//! chunk (spec §4.1).

use super::types::{AudioChunk, AudioValidationError};
use crate::config::FRAME_SIZE;

/// Minimum chunk size: 1ms of audio at 16kHz mono float32 (`0.001 * 16000 * 1 * 4`),
/// resolved against `original_source`'s `audio_validator.py` (spec §3 supplement).
const MIN_CHUNK_BYTES: usize = 64;

/// Validates a chunk in the order spec §4.1 lists: non-empty, within the
/// per-session size ceiling, at least 1ms of audio, frame-aligned.
pub fn validate(chunk: &AudioChunk, max_buffer_bytes: usize) -> Result<(), AudioValidationError> {
    if chunk.is_empty() {
        return Err(AudioValidationError::Empty);
    }

    if chunk.len() > max_buffer_bytes {
        return Err(AudioValidationError::TooLarge {
            actual: chunk.len(),
            max: max_buffer_bytes,
        });
    }

    if chunk.len() < MIN_CHUNK_BYTES {
        return Err(AudioValidationError::TooSmall {
            actual: chunk.len(),
            min: MIN_CHUNK_BYTES,
        });
    }

    if chunk.len() % FRAME_SIZE as usize != 0 {
        return Err(AudioValidationError::Misaligned {
            actual: chunk.len(),
            frame_size: FRAME_SIZE,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const MAX: usize = 1_920_000;

    fn chunk_of(len: usize) -> AudioChunk {
        AudioChunk::new(vec![0u8; len])
    }

    #[test]
    fn rejects_empty_chunk() {
        assert_eq!(validate(&chunk_of(0), MAX), Err(AudioValidationError::Empty));
    }

    #[test]
    fn rejects_oversized_chunk() {
        let err = validate(&chunk_of(MAX + 4), MAX).unwrap_err();
        assert!(matches!(err, AudioValidationError::TooLarge { .. }));
    }

    /// Boundary cases around the minimum-size and frame-alignment gates
    /// (spec §4.1): one byte under/at/over the 1ms floor, and the
    /// Scenario S4 malformed 7-byte frame.
    #[rstest]
    #[case(63, AudioValidationError::TooSmall { actual: 63, min: 64 })]
    #[case(7, AudioValidationError::TooSmall { actual: 7, min: 64 })]
    fn rejects_chunk_below_minimum_size(
        #[case] len: usize,
        #[case] expected: AudioValidationError,
    ) {
        assert_eq!(validate(&chunk_of(len), MAX), Err(expected));
    }

    #[rstest]
    #[case(64)]
    #[case(3200)]
    #[case(MAX)]
    fn accepts_well_formed_chunk_sizes(#[case] len: usize) {
        assert!(validate(&chunk_of(len), MAX).is_ok());
    }

    #[test]
    fn rejects_misaligned_chunk() {
        let err = validate(&chunk_of(65), MAX).unwrap_err();
        assert!(matches!(err, AudioValidationError::Misaligned { .. }));
    }
}
