//! Phase progression engine.
//!
//! The engine owns the one mutable resource (`EngineState`) and drives
//! the evaluation pipeline: fetch snapshot → score criteria → transition
//! or advise → persist → notify. Collaborators are injected once at
//! construction; nothing is looked up dynamically.

pub mod advisor;
pub mod evaluator;
pub mod executor;
pub mod report;
pub mod scheduler;
pub mod selector;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogConfig, PhaseCatalog};
use crate::collaborators::http::{
    HttpMarketRanker, HttpMetricsProvider, HttpNotifier, HttpRecommendationProvider, build_client,
};
use crate::collaborators::local::{FileMetricsProvider, LogNotifier, StaticDirectoryRanker};
use crate::collaborators::{
    Collaborators, MarketRanker, MetricsProvider, Notifier, RecommendationProvider,
};
use crate::error::{ConfigError, EngineError, Result, StagegateError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics as obs_metrics;
use crate::retry::call_with_retry;
use crate::snapshot::MetricsSnapshot;
use crate::state::{EngineState, StateStore, TransitionEvent};

use advisor::OptimizerAdvisor;
use executor::{TransitionExecutor, TransitionOutcome};
use report::EngineReport;
use selector::MarketSelector;

/// Result of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The gate was satisfied and a transition was applied and persisted.
    Transitioned {
        /// The recorded transition.
        event: TransitionEvent,
    },
    /// The gate was not satisfied; recommendations were issued.
    NotReady {
        /// Number of failed criteria.
        failed: usize,
        /// Number of recommendations issued.
        recommendations: usize,
    },
    /// The gate was satisfied but the current phase is the catalog's
    /// last entry. No mutation.
    Terminal,
}

/// The phase progression engine.
pub struct Engine {
    config: Arc<CatalogConfig>,
    metrics: Arc<dyn MetricsProvider>,
    notifier: Arc<dyn Notifier>,
    advisor: OptimizerAdvisor,
    executor: TransitionExecutor,
    emitter: Arc<EventEmitter>,
    /// The engine state behind the single-flight guard: holding this
    /// lock IS being the evaluation run in progress.
    state: Mutex<EngineState>,
}

impl Engine {
    /// Creates an engine from a validated catalog, a store, and explicit
    /// collaborators, loading persisted state (or creating the initial
    /// document).
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog is empty, the persisted state
    /// cannot be loaded, or its phase does not resolve in the catalog.
    pub fn new(
        config: Arc<CatalogConfig>,
        store: Arc<dyn StateStore>,
        collaborators: Collaborators,
        emitter: Arc<EventEmitter>,
    ) -> Result<Self> {
        let catalog = config.catalog();
        let Some(first) = catalog.first() else {
            return Err(EngineError::EmptyCatalog.into());
        };

        let state = match store.load().map_err(StagegateError::State)? {
            Some(state) => {
                // Fail fast on a state/catalog mismatch
                state.resolve_phase(&catalog).map_err(StagegateError::State)?;
                info!(phase = %state.current_phase, "resuming from persisted state");
                state
            }
            None => {
                let state = EngineState::initial(first);
                info!(phase = %state.current_phase, "no persisted state; starting fresh");
                state
            }
        };

        let retry = config.settings.retry;
        let selector = MarketSelector::new(collaborators.ranker, retry);
        let executor = TransitionExecutor::new(selector, store);
        let advisor = OptimizerAdvisor::new(collaborators.recommender, retry);

        Ok(Self {
            config,
            metrics: collaborators.metrics,
            notifier: collaborators.notifier,
            advisor,
            executor,
            emitter,
            state: Mutex::new(state),
        })
    }

    /// Builds the collaborator set the catalog settings describe: HTTP
    /// adapters where endpoints are configured, offline defaults
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no metrics source is wired —
    /// the engine cannot evaluate anything without one.
    pub fn collaborators_from_settings(config: &CatalogConfig) -> Result<Collaborators> {
        let settings = &config.settings.collaborators;
        let client = build_client(Duration::from_millis(config.settings.retry.call_timeout_ms))
            .map_err(StagegateError::Collaborator)?;

        let metrics: Arc<dyn MetricsProvider> = match (
            &settings.metrics_endpoint,
            &settings.metrics_file,
        ) {
            (Some(endpoint), _) => {
                Arc::new(HttpMetricsProvider::new(client.clone(), endpoint.clone()))
            }
            (None, Some(path)) => Arc::new(FileMetricsProvider::new(path.clone())),
            (None, None) => {
                return Err(ConfigError::InvalidValue {
                    field: "settings.collaborators".to_string(),
                    value: "no metrics source".to_string(),
                    expected: "metrics_endpoint or metrics_file".to_string(),
                }
                .into());
            }
        };

        let ranker: Arc<dyn MarketRanker> = settings.ranker_endpoint.as_ref().map_or_else(
            || {
                Arc::new(StaticDirectoryRanker::new(settings.candidate_markets.clone()))
                    as Arc<dyn MarketRanker>
            },
            |endpoint| {
                Arc::new(HttpMarketRanker::new(client.clone(), endpoint.clone()))
                    as Arc<dyn MarketRanker>
            },
        );

        let recommender: Option<Arc<dyn RecommendationProvider>> = settings
            .recommender_endpoint
            .as_ref()
            .map(|endpoint| {
                Arc::new(HttpRecommendationProvider::new(client.clone(), endpoint.clone()))
                    as Arc<dyn RecommendationProvider>
            });

        let notifier: Arc<dyn Notifier> = settings.notifier_endpoint.as_ref().map_or_else(
            || Arc::new(LogNotifier) as Arc<dyn Notifier>,
            |endpoint| Arc::new(HttpNotifier::new(client, endpoint.clone())) as Arc<dyn Notifier>,
        );

        Ok(Collaborators {
            metrics,
            ranker,
            recommender,
            notifier,
        })
    }

    /// Returns the catalog settings.
    #[must_use]
    pub fn settings(&self) -> &crate::catalog::EngineSettings {
        &self.config.settings
    }

    /// Returns a point-in-time copy of the engine state.
    pub async fn state_snapshot(&self) -> EngineState {
        self.state.lock().await.clone()
    }

    /// Attempts an evaluation run, skipping if one is already in flight.
    ///
    /// Both the scheduled timer and the on-demand trigger funnel through
    /// this method; an overlapping firing is dropped, not queued.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RunInProgress` when the single-flight guard
    /// is held, or the underlying run error.
    pub async fn try_run(&self) -> Result<RunOutcome> {
        let Ok(mut guard) = self.state.try_lock() else {
            debug!("evaluation already in progress; trigger dropped");
            obs_metrics::record_run_skipped();
            self.emitter.emit(Event::RunSkipped {
                timestamp: Utc::now(),
                reason: "already in progress".to_string(),
            });
            return Err(EngineError::RunInProgress.into());
        };
        self.run_locked(&mut guard).await
    }

    /// The evaluation pipeline, holding the single-flight guard.
    async fn run_locked(&self, state: &mut EngineState) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let catalog = self.config.catalog();

        // 1. Snapshot — bounded retry; a failed fetch abandons the cycle
        //    with state untouched.
        let metrics = Arc::clone(&self.metrics);
        let snapshot = call_with_retry(&self.config.settings.retry, "metrics", move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.snapshot().await }
        })
        .await
        .inspect_err(|_| obs_metrics::record_run_failure())?;

        // 2. Evaluate the current phase's gate.
        let phase = state.resolve_phase(&catalog).map_err(StagegateError::State)?;
        let evaluation = evaluator::evaluate(
            &phase.success_criteria,
            &snapshot,
            self.config.settings.pass_fraction,
        );
        let phase_id = phase.id.clone();
        let phase_order = phase.order;

        info!(
            run_id = %run_id,
            phase = %phase_id,
            ready = evaluation.ready,
            passed = evaluation.passed.len(),
            total = evaluation.total(),
            "evaluation complete"
        );
        obs_metrics::record_evaluation(evaluation.ready);
        self.emitter.emit(Event::EvaluationCompleted {
            timestamp: Utc::now(),
            run_id,
            phase: phase_id.clone(),
            ready: evaluation.ready,
            passed: evaluation.passed.len(),
            total: evaluation.total(),
        });

        let outcome = if evaluation.ready {
            self.run_ready(run_id, state, &catalog, snapshot, &evaluation, &phase_id)
                .await?
        } else {
            self.run_not_ready(run_id, state, &evaluation, &phase_id).await
        };

        obs_metrics::record_state(
            match &outcome {
                RunOutcome::Transitioned { event } => catalog
                    .by_id(&event.to_phase)
                    .map_or(phase_order, |p| p.order),
                RunOutcome::NotReady { .. } | RunOutcome::Terminal => phase_order,
            },
            state.active_markets.len(),
        );

        Ok(outcome)
    }

    /// Ready path: transition (or terminal no-op), then notify.
    async fn run_ready(
        &self,
        run_id: Uuid,
        state: &mut EngineState,
        catalog: &PhaseCatalog<'_>,
        snapshot: MetricsSnapshot,
        evaluation: &evaluator::Evaluation,
        phase_id: &str,
    ) -> Result<RunOutcome> {
        // Stamp the run before the executor persists, so the document on
        // disk carries it.
        state.touch_evaluation();

        match self
            .executor
            .execute(catalog, state, snapshot)
            .await
            .inspect_err(|_| obs_metrics::record_run_failure())?
        {
            TransitionOutcome::Advanced(event) => {
                self.emitter.emit(Event::PhaseTransition {
                    timestamp: Utc::now(),
                    run_id,
                    from_phase: event.from_phase.clone(),
                    to_phase: event.to_phase.clone(),
                    markets_activated: event.markets_activated.clone(),
                    features_enabled: event.features_enabled.clone(),
                });

                let report = EngineReport::Transition {
                    run_id,
                    timestamp: Utc::now(),
                    phase_before: event.from_phase.clone(),
                    phase_after: event.to_phase.clone(),
                    criteria: evaluation.clone(),
                    markets_activated: event.markets_activated.clone(),
                    features_enabled: event.features_enabled.clone(),
                };
                self.notify(&report).await;

                Ok(RunOutcome::Transitioned { event })
            }
            TransitionOutcome::Terminal => {
                debug!(phase = %phase_id, "terminal phase; evaluation continues for advisory purposes only");
                Ok(RunOutcome::Terminal)
            }
        }
    }

    /// Not-ready path: advise, record, notify. Never mutates state
    /// beyond the evaluation timestamp.
    async fn run_not_ready(
        &self,
        run_id: Uuid,
        state: &mut EngineState,
        evaluation: &evaluator::Evaluation,
        phase_id: &str,
    ) -> RunOutcome {
        let recommendations = self.advisor.advise(evaluation).await;
        state.touch_evaluation();

        self.emitter.emit(Event::RecommendationsIssued {
            timestamp: Utc::now(),
            run_id,
            phase: phase_id.to_string(),
            recommendations: recommendations.clone(),
        });

        let report = EngineReport::Optimization {
            run_id,
            timestamp: Utc::now(),
            phase_before: phase_id.to_string(),
            criteria: evaluation.clone(),
            recommendations: recommendations.clone(),
        };
        self.notify(&report).await;

        RunOutcome::NotReady {
            failed: evaluation.failed.len(),
            recommendations: recommendations.len(),
        }
    }

    /// Delivers a report with the shared retry discipline. Delivery
    /// failure is logged and absorbed: the transition (if any) is
    /// already durable.
    async fn notify(&self, report: &EngineReport) {
        let notifier = Arc::clone(&self.notifier);
        let report_clone = report.clone();
        let result = call_with_retry(&self.config.settings.retry, "notifier", move || {
            let notifier = Arc::clone(&notifier);
            let report = report_clone.clone();
            async move { notifier.notify(&report).await }
        })
        .await;

        if let Err(err) = result {
            metrics::counter!("stagegate_collaborator_failures_total", "role" => "notifier")
                .increment(1);
            warn!(kind = report.kind(), error = %err, "report delivery failed; continuing");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phases", &self.config.phases.len())
            .finish_non_exhaustive()
    }
}
