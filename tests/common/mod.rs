//! Shared integration-test harness: scripted collaborator doubles and
//! catalog fixtures for driving the engine in-process.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stagegate::catalog::{
    CandidateMarket, CatalogConfig, Comparator, Criterion, EngineSettings, MarketPolicy,
    PhaseDefinition, RetrySettings,
};
use stagegate::collaborators::{
    Collaborators, FailedCriterionContext, MarketRanker, MetricsProvider, Notifier,
    Recommendation, RecommendationProvider,
};
use stagegate::engine::Engine;
use stagegate::engine::report::EngineReport;
use stagegate::error::CollaboratorError;
use stagegate::observability::EventEmitter;
use stagegate::snapshot::{MetricValue, MetricsSnapshot};
use stagegate::state::{MemoryStateStore, StateStore};

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Metrics provider returning a programmable snapshot.
#[derive(Default)]
pub struct ScriptedMetrics {
    values: Mutex<BTreeMap<String, MetricValue>>,
    fail: AtomicBool,
    delay_ms: std::sync::atomic::AtomicU64,
    pub calls: AtomicU32,
}

impl ScriptedMetrics {
    pub fn new(values: &[(&str, f64)]) -> Self {
        let provider = Self::default();
        provider.replace(values);
        provider
    }

    /// Replaces the whole metric map.
    pub fn replace(&self, values: &[(&str, f64)]) {
        let mut guard = self.values.lock().unwrap();
        *guard = values
            .iter()
            .map(|(k, v)| ((*k).to_string(), MetricValue::Number(*v)))
            .collect();
    }

    /// Sets a single metric.
    pub fn set(&self, name: &str, value: f64) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), MetricValue::Number(value));
    }

    /// Removes a metric entirely.
    pub fn remove(&self, name: &str) {
        self.values.lock().unwrap().remove(name);
    }

    pub fn fail_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes each snapshot call take this long (for overlap tests).
    pub fn set_delay_ms(&self, delay: u64) {
        self.delay_ms.store(delay, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetricsProvider for ScriptedMetrics {
    async fn snapshot(&self) -> Result<MetricsSnapshot, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::CallFailed {
                role: "metrics",
                message: "scripted outage".to_string(),
            });
        }
        Ok(MetricsSnapshot::now(self.values.lock().unwrap().clone()))
    }
}

/// Ranker with a fixed directory and a scriptable rank response.
/// `response: None` simulates collaborator failure (selector falls back).
pub struct ScriptedRanker {
    directory: Vec<CandidateMarket>,
    response: Mutex<Option<Vec<String>>>,
}

impl ScriptedRanker {
    pub fn new(directory: Vec<CandidateMarket>) -> Self {
        Self {
            directory,
            response: Mutex::new(None),
        }
    }

    pub fn respond_with(&self, ids: &[&str]) {
        *self.response.lock().unwrap() =
            Some(ids.iter().map(ToString::to_string).collect());
    }

    pub fn fail_ranking(&self) {
        *self.response.lock().unwrap() = None;
    }
}

#[async_trait]
impl MarketRanker for ScriptedRanker {
    async fn candidates(&self) -> Result<Vec<CandidateMarket>, CollaboratorError> {
        Ok(self.directory.clone())
    }

    async fn rank_top(
        &self,
        _pool: &[CandidateMarket],
        _n: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or(CollaboratorError::CallFailed {
                role: "ranker",
                message: "scripted outage".to_string(),
            })
    }
}

/// Recommender returning a fixed response and recording the contexts it
/// was called with.
#[derive(Default)]
pub struct ScriptedRecommender {
    response: Mutex<Vec<Recommendation>>,
    pub contexts: Mutex<Vec<Vec<FailedCriterionContext>>>,
}

impl ScriptedRecommender {
    pub fn respond_with(&self, recs: Vec<Recommendation>) {
        *self.response.lock().unwrap() = recs;
    }
}

#[async_trait]
impl RecommendationProvider for ScriptedRecommender {
    async fn recommend(
        &self,
        failed: &[FailedCriterionContext],
    ) -> Result<Vec<Recommendation>, CollaboratorError> {
        self.contexts.lock().unwrap().push(failed.to_vec());
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Notifier recording every delivered report, optionally failing.
#[derive(Default)]
pub struct RecordingNotifier {
    pub reports: Mutex<Vec<EngineReport>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<EngineReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, report: &EngineReport) -> Result<(), CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::CallFailed {
                role: "notifier",
                message: "scripted outage".to_string(),
            });
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

// ============================================================================
// Catalog fixtures
// ============================================================================

/// Retry settings that keep test failures fast.
pub fn fast_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 1,
        base_delay_ms: 1,
        max_delay_ms: 1,
        jitter_ms: 0,
        call_timeout_ms: 1_000,
    }
}

pub fn criterion(metric: &str, comparator: Comparator, threshold: f64) -> Criterion {
    Criterion {
        metric: metric.to_string(),
        comparator,
        threshold,
    }
}

/// The standard launch gate used across scenarios: five criteria over
/// the documented vocabulary.
pub fn launch_gate() -> Vec<Criterion> {
    vec![
        criterion("daysRunning", Comparator::AtLeast, 45.0),
        criterion("payingCustomers", Comparator::AtLeast, 20.0),
        criterion("monthlyRecurringRevenue", Comparator::AtLeast, 4000.0),
        criterion("conversionRate", Comparator::AtLeast, 10.0),
        criterion("churnRate", Comparator::AtMost, 5.0),
    ]
}

/// Metrics that satisfy every criterion of [`launch_gate`].
pub fn metrics_all_pass() -> Vec<(&'static str, f64)> {
    vec![
        ("daysRunning", 45.0),
        ("payingCustomers", 20.0),
        ("monthlyRecurringRevenue", 4000.0),
        ("conversionRate", 10.0),
        ("churnRate", 5.0),
        ("systemUptime", 99.0),
    ]
}

pub fn phase(id: &str, order: u32, policy: MarketPolicy, criteria: Vec<Criterion>) -> PhaseDefinition {
    PhaseDefinition {
        id: id.to_string(),
        order,
        name: id.to_string(),
        target_kpis: indexmap::IndexMap::new(),
        market_policy: policy,
        feature_set: std::collections::BTreeSet::new(),
        success_criteria: criteria,
        messaging_template: None,
    }
}

pub fn market(id: &str, density: f64) -> CandidateMarket {
    CandidateMarket {
        id: id.to_string(),
        population: 250_000,
        density,
        growth_rate: 2.5,
    }
}

/// Two-phase catalog: a gated seed phase advancing into a terminal
/// local phase that activates explicit markets.
pub fn two_phase_catalog(markets: Vec<String>) -> CatalogConfig {
    CatalogConfig {
        settings: EngineSettings {
            retry: fast_retry(),
            ..EngineSettings::default()
        },
        phases: vec![
            phase("seed", 0, MarketPolicy::None, launch_gate()),
            phase("local", 1, MarketPolicy::Explicit(markets), vec![]),
        ],
    }
}

// ============================================================================
// Engine harness
// ============================================================================

/// Everything a test needs to drive one engine instance.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub metrics: Arc<ScriptedMetrics>,
    pub ranker: Arc<ScriptedRanker>,
    pub recommender: Arc<ScriptedRecommender>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStateStore>,
}

impl Harness {
    /// Builds an engine over scripted collaborators and an in-memory
    /// store.
    pub fn new(config: CatalogConfig, directory: Vec<CandidateMarket>) -> Self {
        Self::with_store(config, directory, Arc::new(MemoryStateStore::new()))
    }

    /// Builds an engine reusing an existing store (for restart tests).
    pub fn with_store(
        config: CatalogConfig,
        directory: Vec<CandidateMarket>,
        store: Arc<MemoryStateStore>,
    ) -> Self {
        let metrics = Arc::new(ScriptedMetrics::default());
        let ranker = Arc::new(ScriptedRanker::new(directory));
        let recommender = Arc::new(ScriptedRecommender::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let collaborators = Collaborators {
            metrics: Arc::clone(&metrics) as Arc<dyn MetricsProvider>,
            ranker: Arc::clone(&ranker) as Arc<dyn MarketRanker>,
            recommender: Some(Arc::clone(&recommender) as Arc<dyn RecommendationProvider>),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        };

        let engine = Engine::new(
            Arc::new(config),
            Arc::clone(&store) as Arc<dyn StateStore>,
            collaborators,
            Arc::new(EventEmitter::noop()),
        )
        .expect("engine construction");

        Self {
            engine: Arc::new(engine),
            metrics,
            ranker,
            recommender,
            notifier,
            store,
        }
    }
}
