//! HTTP and WebSocket server for the voice command gateway

pub mod health;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::session::SessionManager;
use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Live decode sessions, one per WebSocket connection
    pub sessions: Arc<SessionManager>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    sessions: Arc<SessionManager>,
    host: String,
    port: u16,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            host: "127.0.0.1".to_string(),
            port: 8765,
        }
    }

    /// Set the interface to bind
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port to listen on
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                sessions: self.sessions,
            }),
            host: self.host,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(websocket::router(Arc::clone(&self.state)))
            .merge(health::router(Arc::clone(&self.state)));

        // Browser clients connect from whatever origin serves the game page
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until the process exits
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind {addr}: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            engine = self.state.sessions.engine_name(),
            "voice command server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("server error: {e}")))?;

        Ok(())
    }
}
