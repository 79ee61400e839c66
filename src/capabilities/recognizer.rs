//! Speech recognition capability.
//!
//! `transcribe(samples, language) -> {text, segments} | error`. Silence or
//! out-of-distribution audio should yield empty output rather than
//! hallucinated text; callers rely on VAD as the first gate when the
//! upstream model cannot guarantee this itself (spec §4.3).

use async_trait::async_trait;

use super::CapabilityError;
use crate::wire::Segment;

/// Raw recognizer output, reused across both pipeline phases (spec §4.4's
/// reuse invariant: the recognizer runs exactly once per flushed buffer).
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerOutput {
    pub text: String,
    pub segments: Vec<Segment>,
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
    ) -> Result<RecognizerOutput, CapabilityError>;
}

/// Whisper-backed implementation (spec §4.3), gated behind the `whisper`
/// feature. Grounded on the teacher's `WhisperEngine` (`asr/whisper.rs`):
/// validated config, a fixed language/task, and a device-capability check
/// performed once at load time rather than per call.
#[cfg(feature = "whisper")]
pub mod whisper {
    use futures_util::StreamExt;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct WhisperRecognizerConfig {
        pub model_path: std::path::PathBuf,
        pub model_url: String,
        pub num_threads: usize,
    }

    pub struct WhisperRecognizer {
        config: WhisperRecognizerConfig,
        context: whisper_rs::WhisperContext,
    }

    impl WhisperRecognizer {
        /// Downloads the model to `config.model_path` if not already present,
        /// then loads it. Grounded on the teacher's
        /// `asr/model_manager.rs::download_model`, minus its checksum
        /// verification, since this crate doesn't carry a hashing crate.
        pub async fn load(config: WhisperRecognizerConfig) -> Result<Self, CapabilityError> {
            ensure_model_downloaded(&config.model_path, &config.model_url).await?;

            let context = whisper_rs::WhisperContext::new_with_params(
                config.model_path.to_string_lossy().as_ref(),
                whisper_rs::WhisperContextParameters::default(),
            )
            .map_err(|e| CapabilityError::FatalAtLoad {
                message: format!("failed to load Whisper model: {e}"),
            })?;
            Ok(Self { config, context })
        }
    }

    async fn ensure_model_downloaded(
        model_path: &std::path::Path,
        model_url: &str,
    ) -> Result<(), CapabilityError> {
        if model_path.exists() {
            return Ok(());
        }

        tracing::info!(url = model_url, "downloading Whisper model");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(3600))
            .build()
            .map_err(|e| CapabilityError::FatalAtLoad {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        let response = client.get(model_url).send().await.map_err(|e| {
            CapabilityError::FatalAtLoad {
                message: format!("failed to start Whisper model download: {e}"),
            }
        })?;
        if !response.status().is_success() {
            return Err(CapabilityError::FatalAtLoad {
                message: format!(
                    "Whisper model download failed with status: {}",
                    response.status()
                ),
            });
        }

        let temp_path = model_path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
            CapabilityError::FatalAtLoad {
                message: format!("failed to create temp file for model download: {e}"),
            }
        })?;

        let mut stream = response.bytes_stream();
        use tokio::io::AsyncWriteExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CapabilityError::FatalAtLoad {
                message: format!("Whisper model download error: {e}"),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CapabilityError::FatalAtLoad {
                    message: format!("failed writing downloaded model chunk: {e}"),
                })?;
        }

        tokio::fs::rename(&temp_path, model_path)
            .await
            .map_err(|e| CapabilityError::FatalAtLoad {
                message: format!("failed to finalize downloaded model file: {e}"),
            })?;
        tracing::info!("Whisper model downloaded successfully");
        Ok(())
    }

    #[async_trait]
    impl Recognizer for WhisperRecognizer {
        async fn transcribe(
            &self,
            samples: &[f32],
            language: &str,
        ) -> Result<RecognizerOutput, CapabilityError> {
            let mut state = self.context.create_state().map_err(|e| {
                CapabilityError::Internal {
                    message: format!("failed to create Whisper state: {e}"),
                }
            })?;

            let mut params = whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy {
                best_of: 1,
            });
            params.set_language(Some(language));
            params.set_n_threads(self.config.num_threads as i32);

            state.full(params, samples).map_err(|e| {
                let msg = e.to_string();
                if msg.to_lowercase().contains("memory") {
                    CapabilityError::Oom { message: msg }
                } else {
                    CapabilityError::Internal { message: msg }
                }
            })?;

            let num_segments = state.full_n_segments().unwrap_or(0);
            let mut segments = Vec::with_capacity(num_segments as usize);
            let mut text = String::new();

            for i in 0..num_segments {
                let segment_text = state.full_get_segment_text(i).unwrap_or_default();
                let start = state.full_get_segment_t0(i).unwrap_or(0) as f64 / 100.0;
                let end = state.full_get_segment_t1(i).unwrap_or(0) as f64 / 100.0;
                text.push_str(&segment_text);
                segments.push(Segment::new(start, end, segment_text));
            }

            Ok(RecognizerOutput { text, segments })
        }
    }
}

#[cfg(test)]
mockall::mock! {
    pub RecognizerDouble {}

    #[async_trait]
    impl Recognizer for RecognizerDouble {
        async fn transcribe(
            &self,
            samples: &[f32],
            language: &str,
        ) -> Result<RecognizerOutput, CapabilityError>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::mock::MockRecognizer;

    #[tokio::test]
    async fn mock_recognizer_echoes_configured_result() {
        let recognizer = MockRecognizer::with_fixed_result(
            "konnichiwa",
            vec![Segment::new(0.0, 1.2, "konnichiwa")],
        );
        let out = recognizer.transcribe(&[0.0; 16000], "ja").await.unwrap();
        assert_eq!(out.text, "konnichiwa");
        assert_eq!(out.segments.len(), 1);
    }

    #[tokio::test]
    async fn recognizer_trait_object_is_called_with_requested_language() {
        let mut double = RecognizerDouble::new();
        double
            .expect_transcribe()
            .withf(|_samples, language| language == "ja")
            .times(1)
            .returning(|_, _| {
                Ok(RecognizerOutput {
                    text: "konnichiwa".to_string(),
                    segments: vec![Segment::new(0.0, 1.0, "konnichiwa")],
                })
            });

        let recognizer: Box<dyn Recognizer> = Box::new(double);
        let out = recognizer.transcribe(&[0.0f32; 160], "ja").await.unwrap();
        assert_eq!(out.text, "konnichiwa");
    }
}
