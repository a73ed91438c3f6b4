//! HTTP transport for the audit sink
//!
//! Receives audit submissions over HTTP and hands them to the persistence
//! facade; also serves liveness and log directory statistics. Persistence
//! failures surface as a generic server error with no internal detail.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::audit::{AuditRequest, AuditSink, LOG_EXTENSION};
use crate::config::Config;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<AuditSink>,
    pub config: Config,
}

/// Handle to control the running server
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Get the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server gracefully
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if receiver is already dropped
            let _ = tx.send(());
        }
        Ok(())
    }
}

/// Build the router with all routes and the request-tracing middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/log", post(log_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

/// Start the audit sink server
///
/// # Arguments
/// * `port` - Port to listen on (0 lets the OS assign one)
/// * `state` - Shared sink and configuration
///
/// # Returns
/// A `ServerHandle` that can be used to shut down the server
pub async fn start(port: u16, state: AppState) -> Result<ServerHandle> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Audit sink listening on {}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                info!("Audit sink shutting down");
            })
            .await
            .ok();
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        addr: bound_addr,
    })
}

/// Log method and URI for every request.
async fn trace_request(request: Request, next: Next) -> Response {
    debug!("{} {}", request.method(), request.uri());
    next.run(request).await
}

/// POST /log handler
///
/// Persists one audit submission. Any persistence failure is logged with
/// its cause and reported to the caller as a generic server error.
async fn log_handler(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> (StatusCode, Json<Value>) {
    match state.sink.write_log(request) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "message": "Log entry recorded"})),
        ),
        Err(e) => {
            error!("Failed to write audit log: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "Error writing log"})),
            )
        }
    }
}

/// GET /health handler
async fn health_handler() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

/// GET /stats handler
///
/// Summarizes the log directory: file count, total size, and the effective
/// rotation/retention settings.
async fn stats_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let entries = match std::fs::read_dir(&state.config.log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to read log directory for stats: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "Error reading log directory"})),
            );
        }
    };

    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() || path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            total_size += metadata.len();
            file_count += 1;
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "total_files": file_count,
            "total_size_mb": total_size as f64 / 1024.0 / 1024.0,
            "log_directory": state.config.log_dir.display().to_string(),
            "lifetime_hours": state.config.log_lifetime_hours,
            "max_size_mb": state.config.max_log_size_mb,
        })),
    )
}
