//! Criteria evaluation.
//!
//! Scores the current phase's success criteria against a metrics
//! snapshot. Pure: no I/O, no state, same inputs always produce the same
//! verdict. A missing or non-numeric metric degrades its criterion to
//! failed and is logged as a data-quality warning, never an error.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{Comparator, Criterion};
use crate::snapshot::MetricsSnapshot;

/// Outcome of checking one criterion against a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CriterionOutcome {
    /// Metric name the criterion references.
    pub metric: String,
    /// Comparison direction.
    pub comparator: Comparator,
    /// Threshold compared against.
    pub threshold: f64,
    /// Actual snapshot value, `None` when the metric was absent.
    pub actual: Option<f64>,
    /// Signed shortfall `threshold - actual`; the sign indicates the
    /// direction the metric must move. `None` when the metric was absent.
    pub delta: Option<f64>,
}

/// Readiness verdict for one phase against one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Evaluation {
    /// Whether the phase gate is satisfied.
    pub ready: bool,
    /// Criteria that passed, in catalog order.
    pub passed: Vec<CriterionOutcome>,
    /// Criteria that failed, in catalog order.
    pub failed: Vec<CriterionOutcome>,
    /// Number of criteria that had to pass for readiness.
    pub required: usize,
}

impl Evaluation {
    /// Total number of criteria evaluated.
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// Fraction of criteria satisfied, `1.0` for ungated phases.
    #[must_use]
    pub fn score(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.passed.len() as f64 / total as f64
            }
        }
    }
}

/// Number of criteria that must pass: `ceil(pass_fraction * total)`.
///
/// Exact at boundaries — with the default fraction 0.8, 4 of 5 passes.
#[must_use]
pub fn required_passes(total: usize, pass_fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let required = (pass_fraction * total as f64).ceil() as usize;
    required.min(total)
}

/// Evaluates a phase's criteria against a snapshot.
///
/// `total == 0` yields `ready = true` unconditionally (ungated phase).
#[must_use]
pub fn evaluate(
    criteria: &[Criterion],
    snapshot: &MetricsSnapshot,
    pass_fraction: f64,
) -> Evaluation {
    let mut passed = Vec::new();
    let mut failed = Vec::new();

    for criterion in criteria {
        let actual = snapshot.get_f64(&criterion.metric);
        let outcome = CriterionOutcome {
            metric: criterion.metric.clone(),
            comparator: criterion.comparator,
            threshold: criterion.threshold,
            actual,
            delta: actual.map(|a| criterion.threshold - a),
        };

        match actual {
            Some(value) if criterion.comparator.holds(value, criterion.threshold) => {
                passed.push(outcome);
            }
            Some(_) => failed.push(outcome),
            None => {
                warn!(
                    metric = %criterion.metric,
                    "metric missing from snapshot; criterion counted as failed"
                );
                failed.push(outcome);
            }
        }
    }

    let required = required_passes(criteria.len(), pass_fraction);
    Evaluation {
        ready: passed.len() >= required,
        passed,
        failed,
        required,
    }
}
