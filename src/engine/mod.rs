//! Recognizer engine seam
//!
//! The acoustic model and decoder are an external capability. The gateway
//! only sequences calls into a [`RecognizerEngine`] and interprets the JSON
//! documents it returns; it never does acoustic work itself.
//!
//! Engines are created per decode session through an [`EngineFactory`],
//! which owns the (read-only, shareable) model handle.

#[cfg(feature = "vosk")]
mod vosk;

#[cfg(feature = "vosk")]
pub use self::vosk::{VoskEngine, VoskFactory};

use serde::Deserialize;
use thiserror::Error;

use crate::grammar::CommandGrammar;

/// Failure reported by an engine implementation
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not be constructed (missing model, bad grammar)
    #[error("engine construction failed: {0}")]
    Construction(String),

    /// The decoder failed while processing audio
    #[error("decoding failed: {0}")]
    Decode(String),
}

/// One grammar-constrained recognizer instance
///
/// Instances are mutated in place and must never be called concurrently;
/// a decode session owns exactly one.
pub trait RecognizerEngine: Send {
    /// Feed a chunk of little-endian PCM16 audio
    ///
    /// Returns `true` when the chunk completed an utterance, after which
    /// [`result`](Self::result) holds the finalized hypothesis.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Decode`] on an unrecoverable decoder failure
    fn accept_frame(&mut self, frame: &[u8]) -> Result<bool, EngineError>;

    /// Finalized result as a JSON document of the form `{"text": "..."}`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Decode`] if the decoder cannot produce a result
    fn result(&mut self) -> Result<String, EngineError>;

    /// Partial hypothesis as a JSON document of the form `{"partial": "..."}`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Decode`] if the decoder cannot produce a result
    fn partial_result(&mut self) -> Result<String, EngineError>;

    /// Drop all accumulated decoder state
    fn reset(&mut self);
}

/// Builds engine instances bound to a shared model
pub trait EngineFactory: Send + Sync {
    /// Create a fresh engine constrained to `grammar`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Construction`] if the engine cannot be built
    fn create(
        &self,
        grammar: &CommandGrammar,
        sample_rate: u32,
    ) -> Result<Box<dyn RecognizerEngine>, EngineError>;

    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;
}

#[derive(Deserialize)]
struct FinalDocument {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct PartialDocument {
    #[serde(default)]
    partial: Option<String>,
}

/// Extract the trimmed `text` field of a final result document
///
/// A document that does not parse, or lacks the field, yields an empty
/// transcript.
#[must_use]
pub fn parse_final_text(document: &str) -> String {
    match serde_json::from_str::<FinalDocument>(document) {
        Ok(FinalDocument { text: Some(text) }) => text.trim().to_string(),
        Ok(FinalDocument { text: None }) => {
            tracing::debug!(document, "final result has no text field");
            String::new()
        }
        Err(e) => {
            tracing::debug!(document, error = %e, "malformed final result");
            String::new()
        }
    }
}

/// Extract the trimmed `partial` field of a partial result document
#[must_use]
pub fn parse_partial_text(document: &str) -> String {
    serde_json::from_str::<PartialDocument>(document)
        .ok()
        .and_then(|d| d.partial)
        .map(|p| p.trim().to_string())
        .unwrap_or_default()
}
