//! Metrics collection for `stagegate`.
//!
//! Prometheus-compatible metrics with typed convenience functions for
//! recording engine measurements.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::StagegateError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint (metrics are recorded internally and can be read
/// programmatically).
///
/// # Errors
///
/// Returns `StagegateError::Io` if the recorder or HTTP listener cannot
/// be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), StagegateError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| StagegateError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "stagegate_evaluations_total",
        "Total number of evaluation runs completed"
    );
    describe_counter!(
        "stagegate_transitions_total",
        "Total number of phase transitions persisted"
    );
    describe_counter!(
        "stagegate_runs_skipped_total",
        "Evaluation triggers dropped by the single-flight guard"
    );
    describe_counter!(
        "stagegate_run_failures_total",
        "Evaluation runs abandoned before completion"
    );
    describe_counter!(
        "stagegate_collaborator_failures_total",
        "Collaborator calls that exhausted their retries"
    );
    describe_gauge!(
        "stagegate_current_phase_order",
        "Order of the currently active phase"
    );
    describe_gauge!(
        "stagegate_active_markets",
        "Number of currently active markets"
    );
}

/// Records a completed evaluation run.
pub fn record_evaluation(ready: bool) {
    counter!("stagegate_evaluations_total", "ready" => if ready { "true" } else { "false" })
        .increment(1);
}

/// Records a dropped trigger.
pub fn record_run_skipped() {
    counter!("stagegate_runs_skipped_total").increment(1);
}

/// Records an abandoned run.
pub fn record_run_failure() {
    counter!("stagegate_run_failures_total").increment(1);
}

/// Updates the phase/market gauges after a state change.
pub fn record_state(phase_order: u32, active_markets: usize) {
    gauge!("stagegate_current_phase_order").set(f64::from(phase_order));
    #[allow(clippy::cast_precision_loss)]
    gauge!("stagegate_active_markets").set(active_markets as f64);
}
