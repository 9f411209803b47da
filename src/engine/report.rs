//! Structured notification reports.
//!
//! The one message contract between the engine and the delivery
//! collaborator. Tagged with `"type"` when serialized so consumers can
//! dispatch on the report kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::Recommendation;
use crate::engine::evaluator::Evaluation;

/// Report handed to the notifier after each evaluation run that has
/// something to say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineReport {
    /// A phase transition was applied and persisted.
    Transition {
        /// Evaluation run id.
        run_id: Uuid,
        /// When the report was produced.
        timestamp: DateTime<Utc>,
        /// Phase id before the transition.
        phase_before: String,
        /// Phase id after the transition.
        phase_after: String,
        /// Full criteria breakdown that satisfied the gate.
        criteria: Evaluation,
        /// Markets newly activated.
        markets_activated: Vec<String>,
        /// Capability flags newly enabled.
        features_enabled: Vec<String>,
    },

    /// The gate was not satisfied; advisory recommendations follow.
    Optimization {
        /// Evaluation run id.
        run_id: Uuid,
        /// When the report was produced.
        timestamp: DateTime<Utc>,
        /// Phase the operation remains in.
        phase_before: String,
        /// Full criteria breakdown, failed entries included.
        criteria: Evaluation,
        /// Ranked recommendations; empty when the recommendation
        /// collaborator was unavailable this cycle.
        recommendations: Vec<Recommendation>,
    },
}

impl EngineReport {
    /// Returns the run id this report belongs to.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::Transition { run_id, .. } | Self::Optimization { run_id, .. } => *run_id,
        }
    }

    /// Returns the report kind as a static label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "transition",
            Self::Optimization { .. } => "optimization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation() -> Evaluation {
        Evaluation {
            ready: true,
            passed: vec![],
            failed: vec![],
            required: 0,
        }
    }

    #[test]
    fn test_tagged_serialization() {
        let report = EngineReport::Transition {
            run_id: Uuid::nil(),
            timestamp: Utc::now(),
            phase_before: "seed".to_string(),
            phase_after: "local".to_string(),
            criteria: evaluation(),
            markets_activated: vec!["austin-tx".to_string()],
            features_enabled: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "transition");
        assert_eq!(json["phase_after"], "local");
    }

    #[test]
    fn test_kind_labels() {
        let t = EngineReport::Transition {
            run_id: Uuid::nil(),
            timestamp: Utc::now(),
            phase_before: "seed".to_string(),
            phase_after: "local".to_string(),
            criteria: evaluation(),
            markets_activated: vec![],
            features_enabled: vec![],
        };
        assert_eq!(t.kind(), "transition");

        let o = EngineReport::Optimization {
            run_id: Uuid::nil(),
            timestamp: Utc::now(),
            phase_before: "seed".to_string(),
            criteria: evaluation(),
            recommendations: vec![],
        };
        assert_eq!(o.kind(), "optimization");
    }
}
