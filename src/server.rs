//! HTTP trigger for computing a session.
//!
//! This module provides an HTTP server that:
//! - Accepts `{session_id}` via POST /compute
//! - Clears prior results and runs the pipeline synchronously
//! - Rejects a second request for a session that is still running
//!
//! # Architecture
//!
//! ```text
//! Caller ──→ POST /compute ──→ pipeline ──→ result store
//!                                  ↑
//!                            raw-sample store
//! ```

use crate::config::PipelineConfig;
use crate::error::ProcessError;
use crate::pipeline::process_session;
use crate::store::{ResultSink, SampleSource, SessionId};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Pipeline constants used for every request
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, pipeline: PipelineConfig) -> Self {
        Self { port, pipeline }
    }
}

/// Shared server state
pub struct ServerState<S> {
    /// Sample source and result sink
    store: S,
    /// Pipeline constants
    pipeline: PipelineConfig,
    /// Sessions with a computation in progress
    in_flight: Mutex<HashSet<SessionId>>,
}

impl<S> ServerState<S> {
    /// Create new server state
    pub fn new(store: S, pipeline: PipelineConfig) -> Self {
        Self {
            store,
            pipeline,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, session_id: SessionId) -> Option<InFlight<'_>> {
        let mut sessions = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session_id).then_some(InFlight {
            sessions: &self.in_flight,
            session_id,
        })
    }
}

/// Marks a session as running until dropped.
struct InFlight<'a> {
    sessions: &'a Mutex<HashSet<SessionId>>,
    session_id: SessionId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(&self.session_id);
    }
}

/// Request body of POST /compute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub session_id: SessionId,
}

/// Response from compute endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub status: String,
    pub session_id: SessionId,
    pub is_valid: bool,
    pub run_id: Uuid,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: String, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /compute
///
/// Clears prior results for the session and recomputes it.
async fn compute<S>(
    State(state): State<Arc<ServerState<S>>>,
    Json(request): Json<ComputeRequest>,
) -> Result<Json<ComputeResponse>, ApiError>
where
    S: SampleSource + ResultSink + Send + Sync + 'static,
{
    let session_id = request.session_id;
    let _guard = state.claim(session_id).ok_or_else(|| {
        tracing::warn!(session_id, "Computation already in progress");
        api_error(
            StatusCode::CONFLICT,
            format!("Session {session_id} is already being computed"),
            "IN_PROGRESS",
        )
    })?;

    let result = match state.store.clear_session(session_id).await {
        Ok(()) => process_session(&state.store, &state.store, session_id, &state.pipeline).await,
        Err(e) => Err(ProcessError::from(e)),
    };

    let report = result.map_err(|e: ProcessError| {
        tracing::error!(session_id, "Computation failed: {}", e);
        match e {
            ProcessError::Store(e) => api_error(
                StatusCode::BAD_GATEWAY,
                format!("Store request failed: {e}"),
                "STORE_ERROR",
            ),
            ProcessError::Config(e) => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Invalid pipeline configuration: {e}"),
                "CONFIG_ERROR",
            ),
        }
    })?;

    Ok(Json(ComputeResponse {
        status: "ok".to_string(),
        session_id,
        is_valid: report.is_valid(),
        run_id: report.run_id,
    }))
}

/// Build the router over a shared state.
pub fn router<S>(state: Arc<ServerState<S>>) -> Router
where
    S: SampleSource + ResultSink + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/compute", post(compute::<S>))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run<S>(
    config: ServerConfig,
    store: S,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)>
where
    S: SampleSource + ResultSink + Send + Sync + 'static,
{
    config.pipeline.validate()?;
    let state = Arc::new(ServerState::new(store, config.pipeline));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Sleep metrics server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let state = ServerState::new(MemoryStore::new(), PipelineConfig::default());

        let first = state.claim(4);
        assert!(first.is_some());
        assert!(state.claim(4).is_none());
        assert!(state.claim(5).is_some());

        drop(first);
        assert!(state.claim(4).is_some());
    }
}
