//! Optimization advice.
//!
//! Runs only when an evaluation comes back not ready. Turns the failed
//! criteria into a signed-delta context, asks the recommendation
//! collaborator for ranked improvement actions, validates the response
//! shape, and hands the result to the caller for recording and
//! notification. Recommendations are advisory: nothing here ever applies
//! one.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::RetrySettings;
use crate::collaborators::{FailedCriterionContext, Recommendation, RecommendationProvider};
use crate::engine::evaluator::{CriterionOutcome, Evaluation};
use crate::retry::call_with_retry;

/// Builds the collaborator context from an evaluation's failed criteria.
#[must_use]
pub fn failed_context(evaluation: &Evaluation) -> Vec<FailedCriterionContext> {
    evaluation.failed.iter().map(context_entry).collect()
}

fn context_entry(outcome: &CriterionOutcome) -> FailedCriterionContext {
    FailedCriterionContext {
        metric: outcome.metric.clone(),
        comparator: outcome.comparator.symbol().to_string(),
        threshold: outcome.threshold,
        actual: outcome.actual,
        delta: outcome.delta,
    }
}

/// Drops recommendations with an empty action or target metric. The
/// collaborator response is untrusted input.
#[must_use]
pub fn validate_recommendations(response: Vec<Recommendation>) -> Vec<Recommendation> {
    response
        .into_iter()
        .filter(|r| {
            let valid = !r.action.trim().is_empty() && !r.target_metric.trim().is_empty();
            if !valid {
                warn!("recommendation with empty action or target metric discarded");
            }
            valid
        })
        .collect()
}

/// Produces improvement recommendations for not-ready evaluations.
pub struct OptimizerAdvisor {
    provider: Option<Arc<dyn RecommendationProvider>>,
    retry: RetrySettings,
}

impl OptimizerAdvisor {
    /// Creates an advisor. With no provider wired, advice generation is
    /// skipped and every call returns an empty list.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn RecommendationProvider>>, retry: RetrySettings) -> Self {
        Self { provider, retry }
    }

    /// Requests ranked recommendations for the failed criteria.
    ///
    /// Collaborator failure is absorbed: the cycle proceeds with an
    /// empty recommendation list and a log entry.
    pub async fn advise(&self, evaluation: &Evaluation) -> Vec<Recommendation> {
        let Some(provider) = &self.provider else {
            debug!("no recommendation collaborator wired; skipping advice");
            return Vec::new();
        };

        let context = failed_context(evaluation);
        if context.is_empty() {
            return Vec::new();
        }

        let provider = Arc::clone(provider);
        let result = call_with_retry(&self.retry, "recommender", move || {
            let provider = Arc::clone(&provider);
            let context = context.clone();
            async move { provider.recommend(&context).await }
        })
        .await;

        match result {
            Ok(response) => validate_recommendations(response),
            Err(err) => {
                warn!(error = %err, "recommendation collaborator unavailable; skipping advice this cycle");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for OptimizerAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerAdvisor")
            .field("wired", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}
