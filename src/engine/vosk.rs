//! Vosk (Kaldi) recognizer backend

use std::path::Path;
use std::sync::Arc;

use super::{EngineError, EngineFactory, RecognizerEngine};
use crate::audio::PcmDecoder;
use crate::grammar::CommandGrammar;
use crate::{Error, Result};

/// Loads a Vosk model once and hands out grammar-constrained recognizers
pub struct VoskFactory {
    model: Arc<vosk::Model>,
}

impl VoskFactory {
    /// Load the model directory at `path`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory is missing or Vosk rejects it
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "model path '{}' not found, download and extract a model first",
                path.display()
            )));
        }

        vosk::set_log_level(vosk::LogLevel::Error);

        let model = vosk::Model::new(path.to_string_lossy().as_ref())
            .ok_or_else(|| Error::Config(format!("failed to load model from {}", path.display())))?;

        tracing::info!(path = %path.display(), "vosk model loaded");

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl EngineFactory for VoskFactory {
    fn create(
        &self,
        grammar: &CommandGrammar,
        sample_rate: u32,
    ) -> std::result::Result<Box<dyn RecognizerEngine>, EngineError> {
        #[allow(clippy::cast_precision_loss)]
        let recognizer =
            vosk::Recognizer::new_with_grammar(&self.model, sample_rate as f32, grammar.phrases())
                .ok_or_else(|| {
                    EngineError::Construction(
                        "vosk rejected the grammar or sample rate".to_string(),
                    )
                })?;

        Ok(Box::new(VoskEngine {
            recognizer,
            decoder: PcmDecoder::default(),
        }))
    }

    fn name(&self) -> &'static str {
        "vosk"
    }
}

/// One Vosk recognizer plus the PCM reassembly state for its stream
pub struct VoskEngine {
    recognizer: vosk::Recognizer,
    decoder: PcmDecoder,
}

impl RecognizerEngine for VoskEngine {
    fn accept_frame(&mut self, frame: &[u8]) -> std::result::Result<bool, EngineError> {
        let samples = self.decoder.push(frame);
        if samples.is_empty() {
            return Ok(false);
        }

        match self.recognizer.accept_waveform(&samples) {
            vosk::DecodingState::Finalized => Ok(true),
            vosk::DecodingState::Running => Ok(false),
            vosk::DecodingState::Failed => {
                Err(EngineError::Decode("vosk decoding failed".to_string()))
            }
        }
    }

    fn result(&mut self) -> std::result::Result<String, EngineError> {
        let text = self
            .recognizer
            .result()
            .single()
            .map(|r| r.text.to_string())
            .unwrap_or_default();
        Ok(serde_json::json!({ "text": text }).to_string())
    }

    fn partial_result(&mut self) -> std::result::Result<String, EngineError> {
        let partial = self.recognizer.partial_result().partial.to_string();
        Ok(serde_json::json!({ "partial": partial }).to_string())
    }

    fn reset(&mut self) {
        self.recognizer.reset();
        self.decoder.clear();
    }
}
