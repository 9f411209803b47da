//! Transition execution.
//!
//! Applies a phase advance as one logical unit: resolve new markets,
//! union markets and features, advance the phase pointer, append the
//! history event, persist. Persistence strictly precedes notification —
//! a transition that failed to persist never happened.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::PhaseCatalog;
use crate::engine::selector::MarketSelector;
use crate::error::{Result, StagegateError};
use crate::snapshot::MetricsSnapshot;
use crate::state::{EngineState, StateStore, TransitionEvent};

/// Result of an execution attempt on a ready phase.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The state advanced one phase and was persisted.
    Advanced(TransitionEvent),
    /// The current phase is the catalog's last entry: nothing to advance
    /// into. State untouched.
    Terminal,
}

/// Applies phase transitions. The sole writer of `EngineState`.
pub struct TransitionExecutor {
    selector: MarketSelector,
    store: Arc<dyn StateStore>,
}

impl TransitionExecutor {
    /// Creates an executor over the given selector and store.
    #[must_use]
    pub fn new(selector: MarketSelector, store: Arc<dyn StateStore>) -> Self {
        Self { selector, store }
    }

    /// Executes the transition out of the current (ready) phase.
    ///
    /// `state` is only mutated once the new document is durably
    /// persisted; on any failure the in-memory state is left exactly as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns an error when the candidate directory is unreachable or
    /// when persistence fails. Either way no mutation is observable.
    pub async fn execute(
        &self,
        catalog: &PhaseCatalog<'_>,
        state: &mut EngineState,
        snapshot: MetricsSnapshot,
    ) -> Result<TransitionOutcome> {
        let current = state.resolve_phase(catalog).map_err(StagegateError::State)?;

        let Some(next) = catalog.successor(current) else {
            info!(phase = %current.id, "terminal phase ready; no further transitions");
            return Ok(TransitionOutcome::Terminal);
        };

        let new_markets = self
            .selector
            .select(&next.market_policy, &state.active_markets)
            .await?;

        // Stage the transition on a copy; commit only after persistence.
        let mut staged = state.clone();
        let event = staged.apply_transition(next, snapshot, new_markets);

        if let Err(err) = self.store.persist(&staged) {
            warn!(error = %err, "state persistence failed; transition discarded");
            return Err(StagegateError::State(err));
        }

        *state = staged;
        metrics::counter!("stagegate_transitions_total").increment(1);
        info!(
            from = %event.from_phase,
            to = %event.to_phase,
            markets = event.markets_activated.len(),
            features = event.features_enabled.len(),
            "phase transition persisted"
        );

        Ok(TransitionOutcome::Advanced(event))
    }
}

impl std::fmt::Debug for TransitionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionExecutor")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}
