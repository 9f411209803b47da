//! `status` command: print the persisted engine state.

use std::path::PathBuf;

use crate::catalog::CatalogLoader;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::error::{Result, StagegateError, StateError};
use crate::state::{JsonStateStore, StateStore};

/// Prints the persisted state document.
///
/// # Errors
///
/// Returns a usage-shaped I/O error when neither `--state` nor
/// `--config` locates a state document, or a state error when the
/// document cannot be read.
pub fn run(args: &StatusArgs) -> Result<()> {
    let state_path = resolve_state_path(args)?;
    let store = JsonStateStore::new(state_path.clone());

    let Some(state) = store.load().map_err(StagegateError::State)? else {
        return Err(StagegateError::State(StateError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no state document at {}", state_path.display()),
        ))));
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Human => {
            println!("phase:            {}", state.current_phase);
            println!(
                "active markets:   {}",
                if state.active_markets.is_empty() {
                    "(none)".to_string()
                } else {
                    state
                        .active_markets
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            );
            println!(
                "enabled features: {}",
                if state.enabled_features.is_empty() {
                    "(none)".to_string()
                } else {
                    state
                        .enabled_features
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            );
            println!("transitions:      {}", state.transition_history.len());
            match state.last_evaluation {
                Some(ts) => println!("last evaluation:  {ts}"),
                None => println!("last evaluation:  never"),
            }
        }
    }
    Ok(())
}

fn resolve_state_path(args: &StatusArgs) -> Result<PathBuf> {
    if let Some(path) = &args.state {
        return Ok(path.clone());
    }
    if let Some(config_path) = &args.config {
        let load = CatalogLoader::with_defaults().load(config_path)?;
        return Ok(load.config.settings.state_path.clone());
    }
    Err(StagegateError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "either --state or --config is required",
    )))
}
