//! Wire schema shared with clients (spec §6).
//!
//! Dict-shaped messages become tagged records with a `type` discriminator
//! (spec §9): every outbound frame is one variant of [`ServerMessage`],
//! serialized as `{"type": "...", ...fields}` via serde's internal tagging.

use serde::{Deserialize, Serialize};

/// One transcribed span, timed relative to the owning buffer's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
            words: None,
        }
    }
}

/// Word-level timing, relative to the owning buffer's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

/// Earliest start / latest end across a result's segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampRange {
    pub start: f64,
    pub end: f64,
}

impl TimestampRange {
    pub const ZERO: TimestampRange = TimestampRange { start: 0.0, end: 0.0 };

    /// Computes `{min(segment.start), max(segment.end)}`, or `ZERO` if empty
    /// (spec §4.4 step 2).
    pub fn from_segments(segments: &[Segment]) -> Self {
        if segments.is_empty() {
            return Self::ZERO;
        }
        let start = segments
            .iter()
            .map(|s| s.start)
            .fold(f64::INFINITY, f64::min);
        let end = segments
            .iter()
            .map(|s| s.end)
            .fold(f64::NEG_INFINITY, f64::max);
        Self { start, end }
    }
}

/// Machine-readable error classification (spec §3 ErrorMessage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidFormat,
    GpuOom,
    Internal,
}

/// Every frame the server may send, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connection_established")]
    ConnectionEstablished { message: String, session_id: String },

    #[serde(rename = "audio_received")]
    AudioReceived { bytes_received: usize },

    #[serde(rename = "partial")]
    Partial {
        buffer_id: String,
        text: String,
        segments: Vec<Segment>,
        timestamp_range: TimestampRange,
        latency_ms: f64,
    },

    #[serde(rename = "final")]
    Final {
        buffer_id: String,
        text: String,
        segments: Vec<Segment>,
        timestamp_range: TimestampRange,
        latency_ms: f64,
    },

    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

/// One inbound frame as delivered by the transport (spec §6).
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Binary(Vec<u8>),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_range_from_empty_segments_is_zero() {
        assert_eq!(TimestampRange::from_segments(&[]), TimestampRange::ZERO);
    }

    #[test]
    fn timestamp_range_spans_min_start_to_max_end() {
        let segments = vec![
            Segment::new(1.0, 2.0, "a"),
            Segment::new(0.5, 1.5, "b"),
            Segment::new(3.0, 4.2, "c"),
        ];
        let range = TimestampRange::from_segments(&segments);
        assert_eq!(range.start, 0.5);
        assert_eq!(range.end, 4.2);
    }

    #[test]
    fn partial_message_serializes_with_type_tag() {
        let msg = ServerMessage::Partial {
            buffer_id: "buff_20260101_000000_001".to_string(),
            text: "hello".to_string(),
            segments: vec![],
            timestamp_range: TimestampRange::ZERO,
            latency_ms: 12.5,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "partial");
        assert_eq!(json["buffer_id"], "buff_20260101_000000_001");
    }

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let msg = ServerMessage::Error {
            code: ErrorCode::GpuOom,
            message: "oom".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["code"], "GPU_OOM");
    }

    proptest::proptest! {
        /// For any non-empty set of segments, the computed range must bound
        /// every individual segment's start/end (spec §4.4 step 2).
        #[test]
        fn timestamp_range_bounds_every_segment(
            spans in proptest::collection::vec((-1000.0f64..1000.0, 0.0f64..1000.0), 1..20)
        ) {
            let segments: Vec<Segment> = spans
                .iter()
                .map(|&(start, width)| Segment::new(start, start + width, "x"))
                .collect();
            let range = TimestampRange::from_segments(&segments);
            for segment in &segments {
                proptest::prop_assert!(range.start <= segment.start);
                proptest::prop_assert!(range.end >= segment.end);
            }
        }
    }
}
