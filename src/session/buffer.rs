//! Session Buffer (C2)
//!
//! Owned exclusively by one session task. Accumulates raw audio bytes
//! between flushes, tracks silence, and mints the [`BufferId`] that ties a
//! partial result to its final counterpart (spec §3/§4.2).

use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::config::ServerConfig;

/// A stable, human-legible token formed as `buff_YYYYMMDD_HHMMSS_NNN`
/// (spec §3). `NNN` is a zero-padded per-session sequence starting at `001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferId(String);

impl BufferId {
    fn generate(sequence: u32, now: DateTime<Local>) -> Self {
        Self(format!(
            "buff_{}_{:03}",
            now.format("%Y%m%d_%H%M%S"),
            sequence
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-connection, append-only audio buffer with flush-trigger logic
/// (spec §4.2). Not `Sync`: the owning session task is solely responsible
/// for serializing `append`/`flush` calls (spec §5).
pub struct SessionBuffer {
    bytes: Vec<u8>,
    sequence: u32,
    buffer_id: BufferId,
    buffer_start_time: Option<SystemTime>,
    silence: std::time::Duration,
    max_buffer_bytes: usize,
    min_buffer_bytes: usize,
    silence_threshold: std::time::Duration,
}

impl SessionBuffer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            bytes: Vec::new(),
            sequence: 1,
            buffer_id: BufferId::generate(1, Local::now()),
            buffer_start_time: None,
            silence: std::time::Duration::ZERO,
            max_buffer_bytes: config.max_buffer_bytes(),
            min_buffer_bytes: config.min_buffer_bytes(),
            silence_threshold: config.silence_threshold,
        }
    }

    pub fn buffer_id(&self) -> &BufferId {
        &self.buffer_id
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn buffer_start_time(&self) -> Option<SystemTime> {
        self.buffer_start_time
    }

    pub fn silence_duration(&self) -> std::time::Duration {
        self.silence
    }

    /// Records `buffer_start_time` if empty, then extends the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        if self.bytes.is_empty() {
            self.buffer_start_time = Some(SystemTime::now());
        }
        self.bytes.extend_from_slice(bytes);
    }

    /// Adds to the accumulated silence counter.
    pub fn track_silence(&mut self, duration: std::time::Duration) {
        self.silence += duration;
    }

    /// Resets the silence counter. Called when voiced audio is appended.
    pub fn reset_silence(&mut self) {
        self.silence = std::time::Duration::ZERO;
    }

    /// True if either the hard ceiling is reached, or accumulated silence
    /// has crossed the threshold *and* the buffer has reached the minimum
    /// size (spec §4.2). The minimum-size gate prevents flushing a tiny
    /// speech burst that would under-condition the recognizer.
    pub fn should_flush(&self) -> bool {
        if self.bytes.is_empty() {
            return false;
        }
        if self.bytes.len() >= self.max_buffer_bytes {
            return true;
        }
        self.silence >= self.silence_threshold && self.bytes.len() >= self.min_buffer_bytes
    }

    /// Atomically returns the current contents and id, then clears the
    /// buffer and mints the next [`BufferId`] (spec §4.2).
    pub fn flush(&mut self) -> (Vec<u8>, BufferId, Option<SystemTime>) {
        let bytes = std::mem::take(&mut self.bytes);
        let buffer_id = self.buffer_id.clone();
        let start_time = self.buffer_start_time.take();

        self.silence = std::time::Duration::ZERO;
        self.sequence += 1;
        self.buffer_id = BufferId::generate(self.sequence, Local::now());

        (bytes, buffer_id, start_time)
    }
}

/// Test-only helper for constructing a [`BufferId`] outside this module,
/// since production code only ever obtains one from a [`SessionBuffer`].
/// Enabled for this crate's own unit tests and for the `tests`/`benches`
/// targets via the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    use super::BufferId;

    pub fn buffer_id_for_test(sequence: u32) -> BufferId {
        BufferId::generate(sequence, chrono::Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> SessionBuffer {
        SessionBuffer::new(&ServerConfig::default())
    }

    #[test]
    fn starts_with_sequence_one() {
        assert!(buffer().buffer_id().as_str().ends_with("_001"));
    }

    #[test]
    fn buffer_id_format_matches_spec() {
        let b = buffer();
        let id = b.buffer_id().as_str();
        assert!(id.starts_with("buff_"));
        let parts: Vec<&str> = id.trim_start_matches("buff_").split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8); // YYYYMMDD
        assert_eq!(parts[1].len(), 6); // HHMMSS
        assert_eq!(parts[2].len(), 3); // NNN
    }

    #[test]
    fn empty_buffer_has_no_start_time() {
        assert!(buffer().buffer_start_time().is_none());
    }

    #[test]
    fn append_records_start_time_once() {
        let mut b = buffer();
        b.append(&[0u8; 4]);
        let first = b.buffer_start_time();
        assert!(first.is_some());
        b.append(&[0u8; 4]);
        assert_eq!(b.buffer_start_time(), first);
    }

    #[test]
    fn should_not_flush_empty_buffer() {
        assert!(!buffer().should_flush());
    }

    #[test]
    fn should_flush_at_hard_ceiling() {
        let mut b = buffer();
        b.append(&vec![0u8; b.max_buffer_bytes]);
        assert!(b.should_flush());
    }

    #[test]
    fn silence_below_minimum_buffer_does_not_flush() {
        // Scenario S2: 1s of noise after 2s silence, total 3s < 5s minimum.
        let mut b = buffer();
        b.append(&vec![0u8; 192_000]); // 3s of audio
        b.track_silence(std::time::Duration::from_secs_f64(2.1));
        assert!(!b.should_flush());
    }

    #[test]
    fn silence_at_threshold_with_minimum_buffer_flushes() {
        let mut b = buffer();
        b.append(&vec![0u8; b.min_buffer_bytes]);
        b.track_silence(std::time::Duration::from_secs_f64(2.0));
        assert!(b.should_flush());
    }

    #[test]
    fn flush_clears_buffer_and_advances_id() {
        let mut b = buffer();
        b.append(&[0u8; 8]);
        let (bytes, id, start) = b.flush();
        assert_eq!(bytes.len(), 8);
        assert!(id.as_str().ends_with("_001"));
        assert!(start.is_some());
        assert!(b.is_empty());
        assert!(b.buffer_start_time().is_none());
        assert_eq!(b.silence_duration(), std::time::Duration::ZERO);
        assert!(b.buffer_id().as_str().ends_with("_002"));
    }

    #[test]
    fn sequential_flushes_never_repeat_buffer_id() {
        let mut b = buffer();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            b.append(&[0u8; 8]);
            let (_, id, _) = b.flush();
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn reset_silence_zeroes_counter() {
        let mut b = buffer();
        b.track_silence(std::time::Duration::from_secs(1));
        b.reset_silence();
        assert_eq!(b.silence_duration(), std::time::Duration::ZERO);
    }
}
