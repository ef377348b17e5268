//! Per-connection decode state machine

use std::sync::Arc;

use chrono::Utc;

use super::{CommandEvent, ConnectionId};
use crate::engine::{EngineError, RecognizerEngine, parse_final_text, parse_partial_text};
use crate::error::SessionError;
use crate::grammar::CommandGrammar;
use crate::{Error, Result};

/// Lifecycle state of a decode session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting audio frames
    Listening,
    /// Closed or failed; the engine has been released
    Terminated,
}

/// Wraps one recognizer engine and turns audio frames into command events
///
/// A session serves an unbounded sequence of commands: after each finalized
/// utterance it stays in [`SessionState::Listening`]. It only leaves that
/// state through [`terminate`](Self::terminate) or an engine failure.
pub struct DecodeSession {
    id: ConnectionId,
    grammar: Arc<CommandGrammar>,
    engine: Option<Box<dyn RecognizerEngine>>,
    commands_emitted: u64,
}

impl DecodeSession {
    /// Create a listening session that exclusively owns `engine`
    #[must_use]
    pub fn new(
        id: ConnectionId,
        grammar: Arc<CommandGrammar>,
        engine: Box<dyn RecognizerEngine>,
    ) -> Self {
        Self {
            id,
            grammar,
            engine: Some(engine),
            commands_emitted: 0,
        }
    }

    /// Feed one frame of PCM16 audio
    ///
    /// Returns a [`CommandEvent`] when the frame completed an utterance whose
    /// transcript is a non-sentinel grammar phrase.
    ///
    /// # Errors
    ///
    /// Returns a `Closed` session error if the session is terminated, or an
    /// `EngineFailure` session error (after terminating the session) if the
    /// engine fails
    pub fn feed(&mut self, frame: &[u8]) -> Result<Option<CommandEvent>> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(SessionError::closed(self.id).into());
        };

        let finalized = match engine.accept_frame(frame) {
            Ok(finalized) => finalized,
            Err(e) => return Err(self.fail(&e)),
        };

        if !finalized {
            match engine.partial_result() {
                Ok(document) => {
                    let partial = parse_partial_text(&document);
                    if !partial.is_empty() {
                        tracing::trace!(
                            session_id = %self.id,
                            partial = %partial,
                            "partial hypothesis"
                        );
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = %self.id,
                        error = %e,
                        "partial result unavailable"
                    );
                }
            }
            return Ok(None);
        }

        let document = match engine.result() {
            Ok(document) => document,
            Err(e) => return Err(self.fail(&e)),
        };

        Ok(self.accept_transcript(parse_final_text(&document)))
    }

    /// Decode one complete utterance in batch mode
    ///
    /// The engine is reset before and after, so no state leaks between
    /// unrelated utterances. The final hypothesis is read whether or not the
    /// engine reported an utterance boundary. The returned transcript is
    /// trimmed but not filtered against the grammar.
    ///
    /// # Errors
    ///
    /// Same as [`feed`](Self::feed)
    pub fn decode_utterance(&mut self, pcm: &[u8]) -> Result<String> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(SessionError::closed(self.id).into());
        };

        engine.reset();

        if let Err(e) = engine.accept_frame(pcm) {
            return Err(self.fail(&e));
        }

        let document = match engine.result() {
            Ok(document) => document,
            Err(e) => return Err(self.fail(&e)),
        };
        engine.reset();

        Ok(parse_final_text(&document))
    }

    /// Release the engine; further feeds fail with `Closed`
    pub fn terminate(&mut self) {
        if self.engine.take().is_some() {
            tracing::debug!(
                session_id = %self.id,
                commands = self.commands_emitted,
                "decode session terminated"
            );
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        if self.engine.is_some() {
            SessionState::Listening
        } else {
            SessionState::Terminated
        }
    }

    /// Connection this session belongs to
    #[must_use]
    pub const fn session_id(&self) -> ConnectionId {
        self.id
    }

    /// Number of command events emitted so far
    #[must_use]
    pub const fn commands_emitted(&self) -> u64 {
        self.commands_emitted
    }

    /// Shared grammar the session filters against
    #[must_use]
    pub fn grammar(&self) -> &CommandGrammar {
        &self.grammar
    }

    fn accept_transcript(&mut self, text: String) -> Option<CommandEvent> {
        if text.is_empty() || text == self.grammar.sentinel() {
            tracing::debug!(session_id = %self.id, transcript = %text, "no command in utterance");
            return None;
        }

        if !self.grammar.is_known(&text) {
            tracing::debug!(
                session_id = %self.id,
                transcript = %text,
                "transcript outside grammar"
            );
            return None;
        }

        self.commands_emitted += 1;
        tracing::info!(session_id = %self.id, command = %text, "command recognized");

        Some(CommandEvent {
            text,
            session_id: self.id,
            timestamp: Utc::now(),
        })
    }

    fn fail(&mut self, cause: &EngineError) -> Error {
        tracing::warn!(
            session_id = %self.id,
            error = %cause,
            "engine failure, terminating session"
        );
        self.terminate();
        SessionError::engine_failure(cause.to_string()).into()
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("commands_emitted", &self.commands_emitted)
            .finish_non_exhaustive()
    }
}
