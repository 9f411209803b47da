//! HTTP-backed collaborators.
//!
//! Thin JSON-over-HTTP adapters for deployments where metrics, ranking,
//! recommendations, or notification delivery live behind other services.
//! Each adapter performs a single attempt; the shared retry utility in
//! the engine wraps every call site.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::catalog::CandidateMarket;
use crate::collaborators::{
    FailedCriterionContext, MarketRanker, MetricsProvider, Notifier, Recommendation,
    RecommendationProvider,
};
use crate::engine::report::EngineReport;
use crate::error::CollaboratorError;
use crate::snapshot::{MetricValue, MetricsSnapshot};

/// Builds the shared HTTP client used by all adapters.
///
/// # Errors
///
/// Returns an error when the TLS backend fails to initialize.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::CallFailed {
            role: "http",
            message: e.to_string(),
        })
}

fn call_failed(role: &'static str, err: &reqwest::Error) -> CollaboratorError {
    CollaboratorError::CallFailed {
        role,
        message: err.to_string(),
    }
}

fn check_status(
    role: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    response
        .error_for_status()
        .map_err(|e| call_failed(role, &e))
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    role: &'static str,
    url: &str,
) -> Result<T, CollaboratorError> {
    let response = client.get(url).send().await.map_err(|e| call_failed(role, &e))?;
    check_status(role, response)?
        .json()
        .await
        .map_err(|e| CollaboratorError::InvalidResponse {
            role,
            message: e.to_string(),
        })
}

async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    role: &'static str,
    url: &str,
    body: &B,
) -> Result<T, CollaboratorError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| call_failed(role, &e))?;
    check_status(role, response)?
        .json()
        .await
        .map_err(|e| CollaboratorError::InvalidResponse {
            role,
            message: e.to_string(),
        })
}

// ============================================================================
// Metrics Provider
// ============================================================================

/// Fetches the KPI snapshot from an HTTP endpoint.
///
/// The endpoint returns the §6 metrics contract: a flat JSON object from
/// metric name to float or boolean. The snapshot timestamp is stamped on
/// receipt.
#[derive(Debug, Clone)]
pub struct HttpMetricsProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetricsProvider {
    /// Creates a provider polling the given endpoint.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn snapshot(&self) -> Result<MetricsSnapshot, CollaboratorError> {
        let values: BTreeMap<String, MetricValue> =
            get_json(&self.client, "metrics", &self.endpoint).await?;
        Ok(MetricsSnapshot::now(values))
    }
}

// ============================================================================
// Market Ranker
// ============================================================================

/// Market directory and ranking behind HTTP.
///
/// `GET {endpoint}/candidates` returns the directory;
/// `POST {endpoint}/rank` with `{"pool": [...], "n": N}` returns an
/// ordered list of market ids.
#[derive(Debug, Clone)]
pub struct HttpMarketRanker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMarketRanker {
    /// Creates a ranker against the given base endpoint.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl MarketRanker for HttpMarketRanker {
    async fn candidates(&self) -> Result<Vec<CandidateMarket>, CollaboratorError> {
        let url = format!("{}/candidates", self.endpoint.trim_end_matches('/'));
        get_json(&self.client, "directory", &url).await
    }

    async fn rank_top(
        &self,
        pool: &[CandidateMarket],
        n: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        let url = format!("{}/rank", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "pool": pool.iter().map(|m| &m.id).collect::<Vec<_>>(),
            "n": n,
        });
        post_json(&self.client, "ranker", &url, &body).await
    }
}

// ============================================================================
// Recommendation Provider
// ============================================================================

/// Recommendation generation behind HTTP (typically fronting an AI-text
/// service).
#[derive(Debug, Clone)]
pub struct HttpRecommendationProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecommendationProvider {
    /// Creates a provider posting to the given endpoint.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl RecommendationProvider for HttpRecommendationProvider {
    async fn recommend(
        &self,
        failed: &[FailedCriterionContext],
    ) -> Result<Vec<Recommendation>, CollaboratorError> {
        let body = json!({ "failed_criteria": failed });
        post_json(&self.client, "recommender", &self.endpoint, &body).await
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Posts structured reports to a webhook. At-least-once: the engine may
/// re-deliver after a crash between persistence and notification.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    /// Creates a notifier posting to the given webhook.
    #[must_use]
    pub const fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, report: &EngineReport) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .map_err(|e| call_failed("notifier", &e))?;
        check_status("notifier", response)?;
        Ok(())
    }
}
