//! Shared test utilities
//!
//! Fake recognizer engines standing in for a real acoustic model.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use voicecmd_gateway::audio::{NoiseClip, Utterance};
use voicecmd_gateway::{
    CommandGrammar, EngineError, EngineFactory, RecognizerEngine, SessionManager,
};

/// Grammar used by most tests: the game preset plus a two-word phrase
#[must_use]
pub fn test_grammar() -> Arc<CommandGrammar> {
    Arc::new(
        CommandGrammar::build(["left", "right", "start", "stop", "general knowledge"], "[unk]")
            .expect("valid grammar"),
    )
}

/// Treats audio frames as ASCII text
///
/// Text accumulates until a frame ends in '.', which finalizes everything
/// received so far as the transcript. A frame of "!" fails the decoder.
#[derive(Default)]
pub struct TextEngine {
    buffer: String,
    finalized: String,
}

impl RecognizerEngine for TextEngine {
    fn accept_frame(&mut self, frame: &[u8]) -> Result<bool, EngineError> {
        if frame == b"!" {
            return Err(EngineError::Decode("decoder crashed".to_string()));
        }
        self.buffer.push_str(&String::from_utf8_lossy(frame));
        if let Some(text) = self.buffer.strip_suffix('.') {
            self.finalized = text.trim().to_string();
            self.buffer.clear();
            return Ok(true);
        }
        Ok(false)
    }

    fn result(&mut self) -> Result<String, EngineError> {
        Ok(serde_json::json!({ "text": std::mem::take(&mut self.finalized) }).to_string())
    }

    fn partial_result(&mut self) -> Result<String, EngineError> {
        Ok(serde_json::json!({ "partial": self.buffer }).to_string())
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.finalized.clear();
    }
}

/// Factory for [`TextEngine`]s that counts constructions
#[derive(Default)]
pub struct TextFactory {
    pub created: AtomicUsize,
}

impl TextFactory {
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for TextFactory {
    fn create(
        &self,
        _grammar: &CommandGrammar,
        _sample_rate: u32,
    ) -> Result<Box<dyn RecognizerEngine>, EngineError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TextEngine::default()))
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

/// Session manager over [`TextEngine`]s
#[must_use]
pub fn text_manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Arc::new(TextFactory::default()),
        test_grammar(),
        16000,
    ))
}

/// Transcript that makes [`ScriptedEngine`] fail the decode instead
pub const FAIL: &str = "!";

/// Ignores the audio and returns transcripts from a shared script in order
///
/// Every engine built by one [`ScriptedFactory`] pops from the same queue,
/// so a rebuilt engine continues where the failed one stopped.
pub struct ScriptedEngine {
    script: Arc<Mutex<VecDeque<String>>>,
}

impl RecognizerEngine for ScriptedEngine {
    fn accept_frame(&mut self, _frame: &[u8]) -> Result<bool, EngineError> {
        let mut script = self.script.lock().expect("script lock");
        if script.front().is_some_and(|t| t == FAIL) {
            script.pop_front();
            return Err(EngineError::Decode("scripted failure".to_string()));
        }
        Ok(true)
    }

    fn result(&mut self) -> Result<String, EngineError> {
        let text = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_default();
        Ok(serde_json::json!({ "text": text }).to_string())
    }

    fn partial_result(&mut self) -> Result<String, EngineError> {
        Ok(r#"{"partial":""}"#.to_string())
    }

    fn reset(&mut self) {}
}

/// Factory for [`ScriptedEngine`]s sharing one transcript queue
pub struct ScriptedFactory {
    script: Arc<Mutex<VecDeque<String>>>,
    pub created: AtomicUsize,
    /// Refuse to build engines, as with a missing model
    pub broken: bool,
}

impl ScriptedFactory {
    pub fn new<I, S>(transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Arc::new(Mutex::new(transcripts.into_iter().map(Into::into).collect())),
            created: AtomicUsize::new(0),
            broken: false,
        }
    }

    /// Transcripts not consumed yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock").len()
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(
        &self,
        _grammar: &CommandGrammar,
        _sample_rate: u32,
    ) -> Result<Box<dyn RecognizerEngine>, EngineError> {
        if self.broken {
            return Err(EngineError::Construction("model not found".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: Arc::clone(&self.script),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Tone at 440 Hz standing in for a spoken command
#[must_use]
pub fn utterance(label: &str, len: usize) -> Utterance {
    let samples = (0..len)
        .map(|i| {
            let t = i as f64 / 16000.0;
            (8000.0 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as i16
        })
        .collect();
    Utterance {
        id: format!("{}.wav", label.replace(' ', "_")),
        ground_truth_label: label.to_string(),
        samples,
        sample_rate: 16000,
    }
}

/// Deterministic pseudo-random noise
#[must_use]
pub fn noise_clip(len: usize) -> NoiseClip {
    let mut state: u32 = 0x1234_5678;
    let samples = (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 16) as i16) / 4
        })
        .collect();
    NoiseClip {
        samples,
        sample_rate: 16000,
    }
}
