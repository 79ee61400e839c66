//! Transcription Pipeline (C4)
//!
//! Two-phase orchestrator: `process_partial` runs VAD + recognition and
//! returns as soon as recognition completes; `process_final` runs the
//! remaining enrichment stages (align, diarize, correct) over the same
//! recognizer output (spec §4.4). The recognizer is called exactly once
//! per flushed buffer; `process_final` never re-transcribes.

use std::time::{Instant, SystemTime};

use thiserror::Error;

use crate::capabilities::{CapabilityError, Capabilities, RecognizerOutput};
use crate::resource::ResourceSupervisor;
use crate::session::buffer::BufferId;
use crate::wire::{Segment, TimestampRange};

/// A `partial` or `final` result body, shared shape per spec §3.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub buffer_id: BufferId,
    pub text: String,
    pub segments: Vec<Segment>,
    pub timestamp_range: TimestampRange,
    pub latency_ms: f64,
}

/// Everything `process_partial` hands back to the session runtime: the
/// wire-ready result, and (when recognition ran) the raw recognizer output
/// the caller must thread into `process_final` unchanged.
pub struct PartialOutcome {
    pub result: TranscriptionResult,
    pub recognizer_output: Option<RecognizerOutput>,
}

/// Failures that abort the current buffer (spec §4.4 step 3). Both
/// variants are per-buffer faults: the session continues on the next one.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("GPU out of memory: {message}")]
    GpuOom { message: String },

    #[error("pipeline stage failed: {message}")]
    Internal { message: String },
}

impl From<CapabilityError> for PipelineError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Oom { message } => PipelineError::GpuOom { message },
            other => PipelineError::Internal {
                message: other.to_string(),
            },
        }
    }
}

pub struct TranscriptionPipeline {
    capabilities: Capabilities,
    resource_supervisor: std::sync::Arc<ResourceSupervisor>,
    language: String,
}

impl TranscriptionPipeline {
    pub fn new(
        capabilities: Capabilities,
        resource_supervisor: std::sync::Arc<ResourceSupervisor>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            capabilities,
            resource_supervisor,
            language: language.into(),
        }
    }

    /// Step 1: VAD gate. Step 2: recognize, on success returning both the
    /// wire result and the raw output for reuse. Step 3: OOM notifies the
    /// resource supervisor and surfaces as `PipelineError::GpuOom`.
    ///
    /// `buffer_start_time` is not part of the recognition math (segment
    /// timings are already relative to the buffer); it only scopes the
    /// structured log span for this buffer, per SPEC_FULL §2's logging
    /// section.
    pub async fn process_partial(
        &self,
        samples: &[f32],
        buffer_id: BufferId,
        buffer_start_time: Option<SystemTime>,
    ) -> Result<PartialOutcome, PipelineError> {
        let span = tracing::info_span!(
            "process_partial",
            buffer_id = %buffer_id,
            buffer_start_time = ?buffer_start_time,
        );
        let _entered = span.enter();

        let start = Instant::now();

        let spans = {
            let _permit = self.resource_supervisor.acquire().await;
            self.capabilities.vad.detect(samples).await
        };
        // VAD's own contract is to fail open; treat a hard Err the same way
        // so a detector bug never silently drops valid audio (spec §4.3).
        let has_speech = match spans {
            Ok(spans) => !spans.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "VAD call failed, failing open");
                true
            }
        };

        if !has_speech {
            return Ok(PartialOutcome {
                result: TranscriptionResult {
                    buffer_id,
                    text: String::new(),
                    segments: Vec::new(),
                    timestamp_range: TimestampRange::ZERO,
                    latency_ms: elapsed_ms(start),
                },
                recognizer_output: None,
            });
        }

        let output = {
            let _permit = self.resource_supervisor.acquire().await;
            self.capabilities
                .recognizer
                .transcribe(samples, &self.language)
                .await
        };

        match output {
            Ok(output) => {
                let timestamp_range = TimestampRange::from_segments(&output.segments);
                let result = TranscriptionResult {
                    buffer_id,
                    text: output.text.clone(),
                    segments: output.segments.clone(),
                    timestamp_range,
                    latency_ms: elapsed_ms(start),
                };
                Ok(PartialOutcome {
                    result,
                    recognizer_output: Some(output),
                })
            }
            Err(CapabilityError::Oom { message }) => {
                self.resource_supervisor
                    .handle_oom(buffer_id.as_str(), &message);
                Err(PipelineError::GpuOom { message })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Align -> diarize -> correct, each degrading to the prior stage's
    /// data on failure rather than aborting (spec §4.4 step 3). Never
    /// returns an error: by the time a buffer reaches this stage, recognition
    /// has already succeeded and enrichment failures are defined to degrade.
    pub async fn process_final(
        &self,
        recognizer_output: RecognizerOutput,
        samples: &[f32],
        buffer_id: BufferId,
    ) -> TranscriptionResult {
        let start = Instant::now();

        let aligned = {
            let _permit = self.resource_supervisor.acquire().await;
            self.capabilities
                .aligner
                .align(recognizer_output.segments.clone(), samples)
                .await
        };
        let aligned = match aligned {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(error = %e, "alignment failed, using recognizer segments");
                recognizer_output.segments.clone()
            }
        };

        let diarized = {
            let _permit = self.resource_supervisor.acquire().await;
            self.capabilities.diarizer.diarize(aligned.clone(), samples).await
        };
        let diarized = match diarized {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(error = %e, "diarization failed, applying default speaker label");
                default_speaker_label(aligned)
            }
        };

        let corrected = self
            .capabilities
            .corrector
            .correct(recognizer_output.text.clone(), diarized.clone())
            .await;
        let (text, segments) = match corrected {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "correction failed, using uncorrected segments");
                (recognizer_output.text, diarized)
            }
        };

        let timestamp_range = TimestampRange::from_segments(&segments);
        TranscriptionResult {
            buffer_id,
            text,
            segments,
            timestamp_range,
            latency_ms: elapsed_ms(start),
        }
    }
}

fn default_speaker_label(mut segments: Vec<Segment>) -> Vec<Segment> {
    for segment in &mut segments {
        segment.speaker.get_or_insert_with(|| "Speaker_00".to_string());
    }
    segments
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::mock;

    fn pipeline(capabilities: Capabilities) -> TranscriptionPipeline {
        TranscriptionPipeline::new(
            capabilities,
            std::sync::Arc::new(ResourceSupervisor::new(4096)),
            "ja",
        )
    }

    fn id() -> BufferId {
        crate::session::buffer::testing::buffer_id_for_test(1)
    }

    #[tokio::test]
    async fn silence_short_circuits_without_recognizer_output() {
        // Invariant 9 / Scenario S1.
        let pipeline = pipeline(Capabilities::mock());
        let samples = vec![0.0f32; 16_000 * 5];
        let outcome = pipeline
            .process_partial(&samples, id(), None)
            .await
            .unwrap();
        assert_eq!(outcome.result.text, "");
        assert!(outcome.result.segments.is_empty());
        assert!(outcome.recognizer_output.is_none());
    }

    #[tokio::test]
    async fn voiced_audio_produces_partial_and_recognizer_output() {
        let pipeline = pipeline(Capabilities::mock());
        let samples: Vec<f32> = (0..16_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let outcome = pipeline
            .process_partial(&samples, id(), None)
            .await
            .unwrap();
        assert!(!outcome.result.text.is_empty());
        assert!(outcome.recognizer_output.is_some());
    }

    #[tokio::test]
    async fn recognizer_oom_surfaces_as_gpu_oom_and_counts_it() {
        struct OomRecognizer;
        #[async_trait::async_trait]
        impl crate::capabilities::Recognizer for OomRecognizer {
            async fn transcribe(
                &self,
                _samples: &[f32],
                _language: &str,
            ) -> Result<RecognizerOutput, CapabilityError> {
                Err(CapabilityError::Oom {
                    message: "cuda out of memory".to_string(),
                })
            }
        }

        let capabilities = Capabilities {
            vad: Box::new(mock::MockVad::always_speech()),
            recognizer: Box::new(OomRecognizer),
            aligner: Box::new(mock::IdentityAligner),
            diarizer: Box::new(mock::DefaultSpeakerDiarizer),
            corrector: Box::new(mock::PassthroughCorrector),
        };
        let supervisor = std::sync::Arc::new(ResourceSupervisor::new(4096));
        let pipeline = TranscriptionPipeline::new(capabilities, supervisor.clone(), "ja");

        let samples = vec![0.1f32; 16_000];
        let err = pipeline
            .process_partial(&samples, id(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::GpuOom { .. }));
        assert_eq!(supervisor.oom_count(), 1);
    }

    #[tokio::test]
    async fn process_final_reuses_recognizer_output_without_recalling_recognizer() {
        let pipeline = pipeline(Capabilities::mock());
        let recognizer_output = RecognizerOutput {
            text: "konnichiwa".to_string(),
            segments: vec![Segment::new(0.0, 1.0, "konnichiwa")],
        };
        let result = pipeline
            .process_final(recognizer_output, &[0.0f32; 16_000], id())
            .await;
        assert_eq!(result.text, "konnichiwa");
        assert_eq!(result.segments[0].speaker.as_deref(), Some("Speaker_00"));
    }

    #[tokio::test]
    async fn process_final_degrades_on_diarizer_failure() {
        struct FailingDiarizer;
        #[async_trait::async_trait]
        impl crate::capabilities::Diarizer for FailingDiarizer {
            async fn diarize(
                &self,
                _segments: Vec<Segment>,
                _samples: &[f32],
            ) -> Result<Vec<Segment>, CapabilityError> {
                Err(CapabilityError::Unavailable {
                    message: "diarizer offline".to_string(),
                })
            }
        }

        let capabilities = Capabilities {
            vad: Box::new(mock::MockVad::always_speech()),
            recognizer: Box::new(mock::MockRecognizer::default()),
            aligner: Box::new(mock::IdentityAligner),
            diarizer: Box::new(FailingDiarizer),
            corrector: Box::new(mock::PassthroughCorrector),
        };
        let pipeline = pipeline(capabilities);
        let recognizer_output = RecognizerOutput {
            text: "hello".to_string(),
            segments: vec![Segment::new(0.0, 1.0, "hello")],
        };
        let result = pipeline
            .process_final(recognizer_output, &[0.0f32; 16_000], id())
            .await;
        assert_eq!(result.segments[0].speaker.as_deref(), Some("Speaker_00"));
    }
}
