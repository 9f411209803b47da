//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod evaluate;
pub mod run;
pub mod status;
pub mod validate;

use crate::cli::args::{Cli, Commands};
use crate::error::StagegateError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), StagegateError> {
    match cli.command {
        Commands::Run(args) => run::run(&args).await,
        Commands::Evaluate(args) => evaluate::run(&args).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Status(args) => status::run(&args),
    }
}
