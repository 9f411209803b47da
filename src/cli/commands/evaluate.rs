//! `evaluate` command: one-shot evaluation run.
//!
//! Uses exactly the same run path as the scheduled timer — there is no
//! second evaluation code path to drift from.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::CatalogLoader;
use crate::cli::args::{EvaluateArgs, OutputFormat};
use crate::engine::{Engine, RunOutcome};
use crate::error::{Result, StagegateError};
use crate::observability::events::EventEmitter;
use crate::state::JsonStateStore;

/// Performs a single evaluation run against the catalog and exits.
///
/// # Errors
///
/// Returns an error when the catalog fails to load or the run is
/// abandoned (metrics unreachable, persistence failure).
pub async fn run(args: &EvaluateArgs) -> Result<()> {
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
    let engine = Engine::new(Arc::clone(&config), store, collaborators, emitter)?;

    let outcome = engine.try_run().await?;
    print_outcome(&outcome, args.format);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let value = match outcome {
                RunOutcome::Transitioned { event } => serde_json::json!({
                    "outcome": "transitioned",
                    "from_phase": event.from_phase,
                    "to_phase": event.to_phase,
                    "markets_activated": event.markets_activated,
                    "features_enabled": event.features_enabled,
                }),
                RunOutcome::NotReady {
                    failed,
                    recommendations,
                } => serde_json::json!({
                    "outcome": "not_ready",
                    "failed_criteria": failed,
                    "recommendations": recommendations,
                }),
                RunOutcome::Terminal => serde_json::json!({ "outcome": "terminal" }),
            };
            println!("{value}");
        }
        OutputFormat::Human => match outcome {
            RunOutcome::Transitioned { event } => {
                println!("transitioned: {} -> {}", event.from_phase, event.to_phase);
                if !event.markets_activated.is_empty() {
                    println!("  markets activated: {}", event.markets_activated.join(", "));
                }
                if !event.features_enabled.is_empty() {
                    println!("  features enabled:  {}", event.features_enabled.join(", "));
                }
            }
            RunOutcome::NotReady {
                failed,
                recommendations,
            } => {
                println!("not ready: {failed} criteria failed, {recommendations} recommendations issued");
            }
            RunOutcome::Terminal => {
                println!("terminal: final phase reached, nothing to advance into");
            }
        },
    }
}
