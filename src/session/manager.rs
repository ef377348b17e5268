//! Session table: one decode session per live connection

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::{CommandEvent, ConnectionId, DecodeSession};
use crate::engine::EngineFactory;
use crate::error::{SessionError, SessionErrorKind};
use crate::grammar::CommandGrammar;
use crate::{Error, Result};

/// How long `remove` waits for an in-flight decode before abandoning it
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared handle to a session; the mutex serializes all feeds into it
pub type SessionHandle = Arc<Mutex<DecodeSession>>;

/// Creates, routes to and tears down decode sessions
///
/// The table lock is only held for map operations. Engine calls run on the
/// blocking pool under the owning session's lock, so sessions for different
/// connections decode in parallel without coordinating.
pub struct SessionManager {
    factory: Arc<dyn EngineFactory>,
    grammar: Arc<CommandGrammar>,
    sample_rate: u32,
    drain_timeout: Duration,
    sessions: RwLock<HashMap<ConnectionId, SessionHandle>>,
}

impl SessionManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        grammar: Arc<CommandGrammar>,
        sample_rate: u32,
    ) -> Self {
        Self {
            factory,
            grammar,
            sample_rate,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Override the teardown drain timeout
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Start a session for `id` with a fresh engine
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `id` already has a session or the engine
    /// cannot be constructed
    pub async fn add(&self, id: ConnectionId) -> Result<SessionHandle> {
        if self.sessions.read().await.contains_key(&id) {
            return Err(duplicate(id));
        }

        // Engine construction can compile the grammar; keep it off the
        // async workers so other connections keep decoding
        let factory = Arc::clone(&self.factory);
        let grammar = Arc::clone(&self.grammar);
        let sample_rate = self.sample_rate;
        let engine = tokio::task::spawn_blocking(move || factory.create(&grammar, sample_rate))
            .await
            .map_err(|e| Error::Config(format!("engine construction aborted: {e}")))?
            .map_err(|e| Error::Config(e.to_string()))?;
        let session = Arc::new(Mutex::new(DecodeSession::new(
            id,
            Arc::clone(&self.grammar),
            engine,
        )));

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(duplicate(id));
        }
        sessions.insert(id, Arc::clone(&session));
        let live = sessions.len();
        drop(sessions);

        tracing::info!(
            session_id = %id,
            engine = self.factory.name(),
            live,
            "decode session started"
        );
        Ok(session)
    }

    /// Terminate and drop the session for `id`; no-op if there is none
    ///
    /// Waits up to the drain timeout for an in-flight feed. If it does not
    /// finish in time the session is abandoned and its engine is released
    /// once that feed returns.
    pub async fn remove(&self, id: ConnectionId) {
        let Some(session) = self.sessions.write().await.remove(&id) else {
            return;
        };

        match tokio::time::timeout(self.drain_timeout, session.lock_owned()).await {
            Ok(mut guard) => guard.terminate(),
            Err(_) => tracing::warn!(
                session_id = %id,
                timeout = ?self.drain_timeout,
                "in-flight decode did not drain, abandoning session"
            ),
        }

        tracing::info!(session_id = %id, "decode session removed");
    }

    /// Feed a frame into the session for `id`
    ///
    /// A session that fails with an engine error is dropped from the table;
    /// other sessions are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownConnection`] if `add` was never called for
    /// `id` (or `remove` already was), otherwise whatever
    /// [`DecodeSession::feed`] returns
    pub async fn route(&self, id: ConnectionId, frame: Vec<u8>) -> Result<Option<CommandEvent>> {
        let session = self
            .session(id)
            .await
            .ok_or(Error::UnknownConnection(id))?;

        let guard = Arc::clone(&session).lock_owned().await;
        let outcome = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            guard.feed(&frame)
        })
        .await
        .unwrap_or_else(|e| {
            Err(SessionError::engine_failure(format!("decode task aborted: {e}")).into())
        });

        if matches!(
            outcome.as_ref().err().and_then(Error::session_kind),
            Some(SessionErrorKind::EngineFailure)
        ) {
            self.evict(id, &session).await;
        }

        outcome
    }

    /// Handle to the live session for `id`
    pub async fn session(&self, id: ConnectionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Whether `id` currently has a session
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Grammar shared by every session
    #[must_use]
    pub fn grammar(&self) -> &Arc<CommandGrammar> {
        &self.grammar
    }

    /// Name of the engine backend
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.factory.name()
    }

    /// Build and drop a throwaway engine to confirm the backend still works
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the engine cannot be constructed
    pub fn probe_engine(&self) -> Result<()> {
        self.factory
            .create(&self.grammar, self.sample_rate)
            .map(drop)
            .map_err(|e| Error::Config(e.to_string()))
    }

    async fn evict(&self, id: ConnectionId, failed: &SessionHandle) {
        let mut sessions = self.sessions.write().await;
        let same = sessions.get(&id).is_some_and(|current| Arc::ptr_eq(current, failed));
        if same {
            sessions.remove(&id);
            tracing::info!(session_id = %id, "failed decode session evicted");
        }
    }
}

fn duplicate(id: ConnectionId) -> Error {
    Error::Config(format!("connection {id} already has a decode session"))
}
