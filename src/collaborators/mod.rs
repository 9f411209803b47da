//! Collaborator contracts.
//!
//! Every external service the engine talks to sits behind an explicit
//! trait, wired once by the composition root. Responses from the ranking
//! and recommendation collaborators are untrusted input: callers validate
//! membership and shape before use.

pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::CandidateMarket;
use crate::engine::report::EngineReport;
use crate::error::CollaboratorError;
use crate::snapshot::MetricsSnapshot;

/// Supplies a fresh KPI snapshot on demand.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Produces the current metrics snapshot.
    async fn snapshot(&self) -> Result<MetricsSnapshot, CollaboratorError>;
}

/// Supplies the candidate market directory and ranks subsets of it.
#[async_trait]
pub trait MarketRanker: Send + Sync {
    /// Returns all known candidate markets.
    async fn candidates(&self) -> Result<Vec<CandidateMarket>, CollaboratorError>;

    /// Returns up to `n` market ids ranked best-first, chosen only from
    /// `pool`. The response is untrusted; callers discard entries outside
    /// the pool.
    async fn rank_top(
        &self,
        pool: &[CandidateMarket],
        n: usize,
    ) -> Result<Vec<String>, CollaboratorError>;
}

/// A single improvement recommendation. Advisory only: the engine
/// records and forwards these, it never acts on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Recommendation {
    /// What to do (e.g. `"increase outreach volume in active markets"`).
    pub action: String,
    /// Metric the action is expected to move.
    pub target_metric: String,
    /// Expected impact, free-form (e.g. `"+5 paying customers"`).
    #[serde(default)]
    pub expected_impact: Option<String>,
    /// Suggested timeline, free-form (e.g. `"2 weeks"`).
    #[serde(default)]
    pub timeline: Option<String>,
}

/// Context handed to the recommendation collaborator: one entry per
/// failed criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FailedCriterionContext {
    /// Metric name.
    pub metric: String,
    /// Comparison symbol (`">="` / `"<="`).
    pub comparator: String,
    /// Threshold required.
    pub threshold: f64,
    /// Actual value, if the metric was present.
    pub actual: Option<f64>,
    /// Signed shortfall `threshold - actual`.
    pub delta: Option<f64>,
}

/// Generates improvement recommendations from failed-criteria context.
#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    /// Returns ranked recommendations, best-first. The response is
    /// untrusted; callers validate shape before use.
    async fn recommend(
        &self,
        failed: &[FailedCriterionContext],
    ) -> Result<Vec<Recommendation>, CollaboratorError>;
}

/// Delivers structured engine reports. At-least-once, fire-and-forget:
/// delivery failure never rolls back a persisted transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a report.
    async fn notify(&self, report: &EngineReport) -> Result<(), CollaboratorError>;
}

/// The collaborators an engine is wired with.
///
/// Built explicitly by the composition root and handed to
/// [`Engine::new`](crate::engine::Engine::new) — the design deliberately
/// has no service registry.
pub struct Collaborators {
    /// KPI snapshot source.
    pub metrics: Arc<dyn MetricsProvider>,
    /// Market directory and ranking.
    pub ranker: Arc<dyn MarketRanker>,
    /// Recommendation generation; `None` skips advice.
    pub recommender: Option<Arc<dyn RecommendationProvider>>,
    /// Report delivery.
    pub notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("recommender_wired", &self.recommender.is_some())
            .finish_non_exhaustive()
    }
}
