//! Operator control endpoint.
//!
//! A small axum surface bound only when `--control <addr>` is given:
//! `POST /evaluate` requests an on-demand run through exactly the same
//! path as the scheduled timer, `GET /status` returns the current state
//! document, `GET /healthz` is a liveness probe.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::Engine;
use crate::engine::scheduler::SchedulerHandle;
use crate::error::{Result, StagegateError};

/// Shared state between the axum handlers.
#[derive(Clone)]
struct ControlState {
    engine: Arc<Engine>,
    scheduler: SchedulerHandle,
}

/// Builds the control router.
fn router(state: ControlState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/evaluate", post(evaluate))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(state): State<ControlState>) -> Response {
    let snapshot = state.engine.state_snapshot().await;
    Json(snapshot).into_response()
}

async fn evaluate(State(state): State<ControlState>) -> Response {
    let triggered = state.scheduler.trigger_now();
    let status = if triggered {
        StatusCode::ACCEPTED
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    (status, Json(json!({ "triggered": triggered }))).into_response()
}

/// Binds the control endpoint and serves it until cancellation.
///
/// # Errors
///
/// Returns an I/O error when the address cannot be bound.
pub async fn serve(
    addr: &str,
    engine: Arc<Engine>,
    scheduler: SchedulerHandle,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(StagegateError::Io)?;
    let local = listener.local_addr().map_err(StagegateError::Io)?;
    info!(addr = %local, "control endpoint listening");

    let app = router(ControlState { engine, scheduler });
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await;
    });
    Ok(handle)
}
