//! Error types for the voice command gateway

use std::fmt;

use thiserror::Error;

use crate::session::ConnectionId;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice command gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing model, empty grammar, duplicate session)
    #[error("configuration error: {0}")]
    Config(String),

    /// Decode session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Frame routed to a connection that has no session
    #[error("no session for connection {0}")]
    UnknownConnection(ConnectionId),

    /// Connection transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// WAV decoding error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Kind of the wrapped session error, if any
    #[must_use]
    pub const fn session_kind(&self) -> Option<SessionErrorKind> {
        match self {
            Self::Session(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Why a decode session refused or failed an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The session is terminated and accepts no more audio
    Closed,
    /// The recognizer engine failed; the session has been terminated
    EngineFailure,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("session closed"),
            Self::EngineFailure => f.write_str("engine failure"),
        }
    }
}

/// Error raised by a decode session
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    /// Feed attempted on a terminated session
    #[must_use]
    pub fn closed(session_id: impl fmt::Display) -> Self {
        Self {
            kind: SessionErrorKind::Closed,
            message: format!("session {session_id} is terminated"),
        }
    }

    /// Underlying engine failed mid-session
    #[must_use]
    pub fn engine_failure(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::EngineFailure,
            message: message.into(),
        }
    }
}
