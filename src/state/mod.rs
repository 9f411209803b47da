//! Engine state: the only mutable, persisted entity.
//!
//! `EngineState` records where the operation stands in the phase
//! progression. It is created once, loaded at every process start, and
//! mutated only by the transition executor after a successful evaluation
//! run. All mutators preserve the progression invariants: markets never
//! deactivate, history only appends, phase order only increases.

pub mod store;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{PhaseCatalog, PhaseDefinition};
use crate::error::StateError;
use crate::snapshot::MetricsSnapshot;

pub use store::{JsonStateStore, MemoryStateStore, StateStore};

/// Record of one phase advance, immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransitionEvent {
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
    /// Phase id advanced from.
    pub from_phase: String,
    /// Phase id advanced to.
    pub to_phase: String,
    /// The snapshot that satisfied the gate.
    pub metrics_snapshot: MetricsSnapshot,
    /// Markets newly activated by this transition.
    pub markets_activated: Vec<String>,
    /// Capability flags newly enabled by this transition.
    pub features_enabled: Vec<String>,
}

/// Durable record of current phase, active markets, and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineState {
    /// Id of the phase the operation currently runs in. Always resolves
    /// to a catalog entry.
    pub current_phase: String,

    /// Markets currently targeted. Monotonically non-decreasing.
    pub active_markets: BTreeSet<String>,

    /// Capability flags currently enabled. Union-only.
    pub enabled_features: BTreeSet<String>,

    /// Append-only transition history, oldest first.
    pub transition_history: Vec<TransitionEvent>,

    /// Timestamp of the last completed evaluation run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluation: Option<DateTime<Utc>>,
}

impl EngineState {
    /// Creates the initial state for a catalog: first phase, no markets,
    /// no history.
    ///
    /// The first phase's own feature set is enabled from the start; its
    /// market policy is not applied (markets activate on transitions).
    #[must_use]
    pub fn initial(first_phase: &PhaseDefinition) -> Self {
        Self {
            current_phase: first_phase.id.clone(),
            active_markets: BTreeSet::new(),
            enabled_features: first_phase.feature_set.clone(),
            transition_history: Vec::new(),
            last_evaluation: None,
        }
    }

    /// Resolves the current phase against the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StateError::UnknownPhase` when the persisted id is not in
    /// the catalog — a state/catalog mismatch the operator must resolve.
    pub fn resolve_phase<'a>(
        &self,
        catalog: &PhaseCatalog<'a>,
    ) -> Result<&'a PhaseDefinition, StateError> {
        catalog
            .by_id(&self.current_phase)
            .ok_or_else(|| StateError::UnknownPhase {
                phase: self.current_phase.clone(),
            })
    }

    /// Applies a transition into `next`, recording the event.
    ///
    /// Set semantics throughout: already-active markets and
    /// already-enabled features are not re-recorded in the event.
    pub fn apply_transition(
        &mut self,
        next: &PhaseDefinition,
        snapshot: MetricsSnapshot,
        new_markets: Vec<String>,
    ) -> TransitionEvent {
        let markets_activated: Vec<String> = new_markets
            .into_iter()
            .filter(|m| !self.active_markets.contains(m))
            .collect();
        let features_enabled: Vec<String> = next
            .feature_set
            .iter()
            .filter(|f| !self.enabled_features.contains(*f))
            .cloned()
            .collect();

        self.active_markets.extend(markets_activated.iter().cloned());
        self.enabled_features.extend(features_enabled.iter().cloned());

        let event = TransitionEvent {
            timestamp: Utc::now(),
            from_phase: self.current_phase.clone(),
            to_phase: next.id.clone(),
            metrics_snapshot: snapshot,
            markets_activated,
            features_enabled,
        };

        self.current_phase = next.id.clone();
        self.transition_history.push(event.clone());
        event
    }

    /// Marks an evaluation run as completed now.
    pub fn touch_evaluation(&mut self) {
        self.last_evaluation = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MarketPolicy, PhaseDefinition};

    fn phase(id: &str, order: u32, features: &[&str]) -> PhaseDefinition {
        PhaseDefinition {
            id: id.to_string(),
            order,
            name: id.to_string(),
            target_kpis: indexmap::IndexMap::new(),
            market_policy: MarketPolicy::None,
            feature_set: features.iter().map(ToString::to_string).collect(),
            success_criteria: vec![],
            messaging_template: None,
        }
    }

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot::now(std::collections::BTreeMap::new())
    }

    #[test]
    fn test_initial_state() {
        let seed = phase("seed", 0, &["email_outreach"]);
        let state = EngineState::initial(&seed);
        assert_eq!(state.current_phase, "seed");
        assert!(state.active_markets.is_empty());
        assert!(state.transition_history.is_empty());
        assert!(state.enabled_features.contains("email_outreach"));
        assert!(state.last_evaluation.is_none());
    }

    #[test]
    fn test_apply_transition_unions_and_appends() {
        let seed = phase("seed", 0, &[]);
        let local = phase("local", 1, &["sms_outreach"]);
        let mut state = EngineState::initial(&seed);

        let event = state.apply_transition(
            &local,
            snapshot(),
            vec!["austin-tx".to_string(), "dallas-tx".to_string()],
        );

        assert_eq!(state.current_phase, "local");
        assert_eq!(state.active_markets.len(), 2);
        assert!(state.enabled_features.contains("sms_outreach"));
        assert_eq!(state.transition_history.len(), 1);
        assert_eq!(event.from_phase, "seed");
        assert_eq!(event.to_phase, "local");
        assert_eq!(event.markets_activated, vec!["austin-tx", "dallas-tx"]);
        assert_eq!(event.features_enabled, vec!["sms_outreach"]);
    }

    #[test]
    fn test_already_active_market_not_re_recorded() {
        let seed = phase("seed", 0, &[]);
        let local = phase("local", 1, &[]);
        let mut state = EngineState::initial(&seed);
        state.active_markets.insert("austin-tx".to_string());

        let event = state.apply_transition(
            &local,
            snapshot(),
            vec!["austin-tx".to_string(), "dallas-tx".to_string()],
        );

        assert_eq!(event.markets_activated, vec!["dallas-tx"]);
        assert_eq!(state.active_markets.len(), 2);
    }

    #[test]
    fn test_markets_never_shrink() {
        let seed = phase("seed", 0, &[]);
        let local = phase("local", 1, &[]);
        let mut state = EngineState::initial(&seed);
        state.active_markets.insert("austin-tx".to_string());

        state.apply_transition(&local, snapshot(), vec![]);
        assert!(state.active_markets.contains("austin-tx"));
    }

    #[test]
    fn test_resolve_phase_unknown() {
        let phases = vec![phase("seed", 0, &[])];
        let catalog = PhaseCatalog::new(&phases);
        let state = EngineState {
            current_phase: "ghost".to_string(),
            active_markets: BTreeSet::new(),
            enabled_features: BTreeSet::new(),
            transition_history: vec![],
            last_evaluation: None,
        };
        assert!(matches!(
            state.resolve_phase(&catalog),
            Err(StateError::UnknownPhase { .. })
        ));
    }

    #[test]
    fn test_state_json_roundtrip() {
        let seed = phase("seed", 0, &["email_outreach"]);
        let local = phase("local", 1, &[]);
        let mut state = EngineState::initial(&seed);
        state.apply_transition(&local, snapshot(), vec!["austin-tx".to_string()]);
        state.touch_evaluation();

        let json = serde_json::to_string(&state).unwrap();
        let reloaded: EngineState = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, state);
    }
}
