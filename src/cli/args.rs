//! CLI argument definitions.
//!
//! All clap derive structs for `stagegate` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Phase-gated growth engine for autonomous market expansion.
#[derive(Parser, Debug)]
#[command(name = "stagegate", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "STAGEGATE_COLOR")]
    pub color: ColorChoice,

    /// Emit logs as newline-delimited JSON.
    #[arg(long, global = true, env = "STAGEGATE_LOG_JSON")]
    pub log_json: bool,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the engine daemon with the recurring scheduler.
    Run(RunArgs),

    /// Perform a single evaluation run and exit.
    Evaluate(EvaluateArgs),

    /// Validate catalog files without running the engine.
    Validate(ValidateArgs),

    /// Print the persisted engine state.
    Status(StatusArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML catalog file.
    #[arg(short, long, env = "STAGEGATE_CATALOG")]
    pub config: PathBuf,

    /// Override the state document path from the catalog settings.
    #[arg(long, env = "STAGEGATE_STATE")]
    pub state: Option<PathBuf>,

    /// Override the evaluation interval (e.g. "24h", "30m").
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<std::time::Duration>,

    /// Bind the operator control endpoint on `host:port`.
    #[arg(long, env = "STAGEGATE_CONTROL_ADDR")]
    pub control: Option<String>,

    /// Expose Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, env = "STAGEGATE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Run one evaluation immediately at startup instead of waiting a
    /// full interval.
    #[arg(long)]
    pub evaluate_on_start: bool,
}

/// Arguments for `evaluate`.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Path to the YAML catalog file.
    #[arg(short, long, env = "STAGEGATE_CATALOG")]
    pub config: PathBuf,

    /// Override the state document path from the catalog settings.
    #[arg(long, env = "STAGEGATE_STATE")]
    pub state: Option<PathBuf>,

    /// Output format for the run summary.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Catalog files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the YAML catalog file (used to locate the state document).
    #[arg(short, long, env = "STAGEGATE_CATALOG")]
    pub config: Option<PathBuf>,

    /// Path to the state document (overrides the catalog settings).
    #[arg(long, env = "STAGEGATE_STATE")]
    pub state: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Value Enums
// ============================================================================

/// Color output control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal support and honor `NO_COLOR`.
    Auto,
    /// Always emit ANSI colors.
    Always,
    /// Never emit ANSI colors.
    Never,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON.
    Json,
}
