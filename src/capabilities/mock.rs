//! Deterministic mock capability implementations.
//!
//! Used for off-GPU development and for this crate's own test suite. Each
//! type here is an ordinary, independent implementation of the matching
//! trait (spec §9). The pipeline never branches on "are we mocking right
//! now", it only ever calls through the trait object.
//!
//! Degradation behavior (identity alignment, default-speaker diarization,
//! passthrough correction) mirrors the stub behavior of the original
//! service's `apply_alignment` / `apply_diarization` / `apply_llm_correction`.

use async_trait::async_trait;

use super::{
    Aligner, CapabilityError, Corrector, Diarizer, Recognizer, RecognizerOutput,
    SpeechSpan, VoiceActivityDetector,
};
use crate::wire::Segment;

/// Root-mean-square energy below which [`MockVad`] reports silence.
const SILENCE_RMS_THRESHOLD: f32 = 1e-4;

/// A VAD whose verdict is either fixed, or derived from sample energy.
pub enum MockVad {
    AlwaysSpeech,
    AlwaysSilence,
    EnergyGated { threshold: f32 },
}

impl MockVad {
    pub fn always_speech() -> Self {
        MockVad::AlwaysSpeech
    }

    pub fn always_silence() -> Self {
        MockVad::AlwaysSilence
    }

    pub fn energy_gated() -> Self {
        MockVad::EnergyGated {
            threshold: SILENCE_RMS_THRESHOLD,
        }
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[async_trait]
impl VoiceActivityDetector for MockVad {
    async fn detect(&self, samples: &[f32]) -> Result<Vec<SpeechSpan>, CapabilityError> {
        let has_speech = match self {
            MockVad::AlwaysSpeech => true,
            MockVad::AlwaysSilence => false,
            MockVad::EnergyGated { threshold } => rms(samples) > *threshold,
        };

        if has_speech && !samples.is_empty() {
            Ok(vec![SpeechSpan {
                start_sample: 0,
                end_sample: samples.len(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// A recognizer that returns a fixed result, or, by default, derives a
/// deterministic placeholder transcript from sample energy so tests can
/// exercise the full pipeline without bundling a real model.
pub struct MockRecognizer {
    fixed: Option<RecognizerOutput>,
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self { fixed: None }
    }
}

impl MockRecognizer {
    pub fn with_fixed_result(text: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            fixed: Some(RecognizerOutput {
                text: text.into(),
                segments,
            }),
        }
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn transcribe(
        &self,
        samples: &[f32],
        _language: &str,
    ) -> Result<RecognizerOutput, CapabilityError> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }

        if samples.is_empty() || rms(samples) <= SILENCE_RMS_THRESHOLD {
            return Ok(RecognizerOutput {
                text: String::new(),
                segments: Vec::new(),
            });
        }

        let duration = samples.len() as f64 / crate::config::SAMPLE_RATE as f64;
        let text = format!("[mock transcription of {duration:.2}s]");
        let segments = vec![Segment::new(0.0, duration, text.clone())];
        Ok(RecognizerOutput { text, segments })
    }
}

/// Alignment stub: returns segments unchanged (spec §4.3: "if unavailable,
/// returns inputs unchanged").
pub struct IdentityAligner;

#[async_trait]
impl Aligner for IdentityAligner {
    async fn align(
        &self,
        segments: Vec<Segment>,
        _samples: &[f32],
    ) -> Result<Vec<Segment>, CapabilityError> {
        Ok(segments)
    }
}

/// Diarization stub: assigns a single default speaker label to every
/// segment (spec §4.3).
pub struct DefaultSpeakerDiarizer;

#[async_trait]
impl Diarizer for DefaultSpeakerDiarizer {
    async fn diarize(
        &self,
        mut segments: Vec<Segment>,
        _samples: &[f32],
    ) -> Result<Vec<Segment>, CapabilityError> {
        for segment in &mut segments {
            segment.speaker = Some("Speaker_00".to_string());
        }
        Ok(segments)
    }
}

/// Correction stub: returns inputs unchanged. A real corrector (e.g.
/// Ollama-backed) fulfills the same trait and degrades the same way on
/// its own connection failures; the pipeline cannot tell the difference.
pub struct PassthroughCorrector;

#[async_trait]
impl Corrector for PassthroughCorrector {
    async fn correct(
        &self,
        text: String,
        segments: Vec<Segment>,
    ) -> Result<(String, Vec<Segment>), CapabilityError> {
        Ok((text, segments))
    }
}
