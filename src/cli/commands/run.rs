//! `run` command: the engine daemon.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::CatalogLoader;
use crate::cli::args::RunArgs;
use crate::control;
use crate::engine::Engine;
use crate::engine::scheduler::EvaluationScheduler;
use crate::error::{Result, StagegateError};
use crate::observability::events::{Event, EventEmitter};
use crate::state::JsonStateStore;

/// Starts the engine daemon: scheduler, optional control endpoint,
/// graceful shutdown on SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error when the catalog fails to load, the persisted state
/// cannot be resolved, or a listener cannot be bound.
pub async fn run(args: &RunArgs) -> Result<()> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    info!(config = %args.config.display(), "loading catalog");
    let load = CatalogLoader::with_defaults().load(&args.config)?;
    for warning in &load.warnings {
        warn!("{warning}");
    }
    let config = load.config;

    let state_path = args
        .state
        .clone()
        .unwrap_or_else(|| config.settings.state_path.clone());
    let store = Arc::new(JsonStateStore::new(state_path));

    let emitter = match &config.settings.event_log_path {
        Some(path) => Arc::new(EventEmitter::from_file(path).map_err(StagegateError::Io)?),
        None => Arc::new(EventEmitter::noop()),
    };

    let collaborators = Engine::collaborators_from_settings(&config)?;
    let engine = Arc::new(Engine::new(
        Arc::clone(&config),
        store,
        collaborators,
        Arc::clone(&emitter),
    )?);

    let interval = args.interval.unwrap_or(config.settings.evaluation_interval);
    let scheduler = EvaluationScheduler::new(Arc::clone(&engine), interval);
    let handle = scheduler.handle();

    let cancel = CancellationToken::new();
    let control_task = match &args.control {
        Some(addr) => Some(
            control::serve(addr, Arc::clone(&engine), handle.clone(), cancel.clone()).await?,
        ),
        None => None,
    };

    emitter.emit(Event::EngineStarted {
        timestamp: Utc::now(),
        phase: engine.state_snapshot().await.current_phase,
        interval_secs: interval.as_secs(),
    });

    let scheduler_task = scheduler.start();
    if args.evaluate_on_start {
        handle.trigger_now();
    }

    shutdown_signal().await;
    info!("shutdown signal received; draining");

    emitter.emit(Event::EngineStopped {
        timestamp: Utc::now(),
        reason: "signal".to_string(),
    });
    handle.shutdown();
    cancel.cancel();

    let _ = scheduler_task.await;
    if let Some(task) = control_task {
        let _ = task.await;
    }
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
