//! Health check and vocabulary endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
    /// Live decode sessions
    pub sessions: usize,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub engine: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }
}

/// Active vocabulary as clients see it
#[derive(Debug, Serialize)]
pub struct GrammarResponse {
    /// Phrases that can be emitted as commands, in configuration order
    pub commands: Vec<String>,
    pub sentinel: String,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can a new connection get a working engine?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let engine = check_engine(&state).await;
    let all_ok = engine.status == "ok";

    let (status, http_status) = if all_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { engine },
            sessions: state.sessions.len().await,
        }),
    )
}

/// Construct a throwaway engine off the async workers
async fn check_engine(state: &ApiState) -> CheckResult {
    let sessions = Arc::clone(&state.sessions);
    match tokio::task::spawn_blocking(move || sessions.probe_engine()).await {
        Ok(Ok(())) => CheckResult::ok(),
        Ok(Err(e)) => CheckResult::fail(e.to_string()),
        Err(e) => CheckResult::fail(format!("engine probe aborted: {e}")),
    }
}

async fn grammar(State(state): State<Arc<ApiState>>) -> Json<GrammarResponse> {
    let grammar = state.sessions.grammar();
    Json(GrammarResponse {
        commands: grammar.commands().map(str::to_string).collect(),
        sentinel: grammar.sentinel().to_string(),
    })
}

/// Build health and vocabulary router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/grammar", get(grammar))
        .with_state(state)
}
