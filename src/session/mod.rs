//! Decode sessions and their per-connection bookkeeping

mod decode;
mod manager;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use decode::{DecodeSession, SessionState};
pub use manager::{DEFAULT_DRAIN_TIMEOUT, SessionHandle, SessionManager};

/// Identifier of one live client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Mint a fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A recognized, in-grammar command
///
/// `text` is always a grammar phrase and never the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEvent {
    pub text: String,
    pub session_id: ConnectionId,
    pub timestamp: DateTime<Utc>,
}

/// Wire form sent to the client for each recognized command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
}

impl From<&CommandEvent> for CommandMessage {
    fn from(event: &CommandEvent) -> Self {
        Self {
            command: event.text.clone(),
        }
    }
}
