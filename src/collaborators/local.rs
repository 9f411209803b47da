//! Offline collaborator implementations.
//!
//! Defaults for fully local operation: metrics read from a JSON file the
//! operator (or a cron-driven export) keeps fresh, a candidate directory
//! listed in the catalog file, and notification through the log.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::catalog::CandidateMarket;
use crate::collaborators::{MarketRanker, MetricsProvider, Notifier};
use crate::engine::report::EngineReport;
use crate::engine::selector::fallback_ranking;
use crate::error::CollaboratorError;
use crate::snapshot::{MetricValue, MetricsSnapshot};

// ============================================================================
// File Metrics Provider
// ============================================================================

/// Reads the KPI snapshot from a JSON file holding the §6 flat metrics
/// map. The snapshot timestamp is stamped on read.
#[derive(Debug, Clone)]
pub struct FileMetricsProvider {
    path: PathBuf,
}

impl FileMetricsProvider {
    /// Creates a provider reading the given file.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MetricsProvider for FileMetricsProvider {
    async fn snapshot(&self) -> Result<MetricsSnapshot, CollaboratorError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CollaboratorError::CallFailed {
                role: "metrics",
                message: format!("{}: {e}", self.path.display()),
            }
        })?;
        let values: BTreeMap<String, MetricValue> =
            serde_json::from_str(&raw).map_err(|e| CollaboratorError::InvalidResponse {
                role: "metrics",
                message: e.to_string(),
            })?;
        Ok(MetricsSnapshot::now(values))
    }
}

// ============================================================================
// Static Directory Ranker
// ============================================================================

/// Candidate directory listed in the catalog file, ranked with the same
/// deterministic ordering the selector falls back to.
#[derive(Debug, Clone)]
pub struct StaticDirectoryRanker {
    markets: Vec<CandidateMarket>,
}

impl StaticDirectoryRanker {
    /// Creates a ranker over a fixed candidate list.
    #[must_use]
    pub const fn new(markets: Vec<CandidateMarket>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl MarketRanker for StaticDirectoryRanker {
    async fn candidates(&self) -> Result<Vec<CandidateMarket>, CollaboratorError> {
        Ok(self.markets.clone())
    }

    async fn rank_top(
        &self,
        pool: &[CandidateMarket],
        n: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        Ok(fallback_ranking(pool).into_iter().take(n).collect())
    }
}

// ============================================================================
// Log Notifier
// ============================================================================

/// Writes structured reports through the log instead of delivering them
/// anywhere. The JSONL event stream remains the durable record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &EngineReport) -> Result<(), CollaboratorError> {
        let body = serde_json::to_string(report).map_err(|e| {
            CollaboratorError::InvalidResponse {
                role: "notifier",
                message: e.to_string(),
            }
        })?;
        info!(kind = report.kind(), report = %body, "engine report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_provider_reads_flat_map() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"payingCustomers": 21, "backupHealthy": true}"#)
            .unwrap();
        let provider = FileMetricsProvider::new(f.path().to_path_buf());
        let snap = provider.snapshot().await.unwrap();
        assert_eq!(snap.get_f64("payingCustomers"), Some(21.0));
        assert_eq!(snap.get_f64("backupHealthy"), Some(1.0));
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let provider = FileMetricsProvider::new(PathBuf::from("/nonexistent/metrics.json"));
        assert!(matches!(
            provider.snapshot().await,
            Err(CollaboratorError::CallFailed { role: "metrics", .. })
        ));
    }

    #[tokio::test]
    async fn test_file_provider_invalid_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"not json").unwrap();
        let provider = FileMetricsProvider::new(f.path().to_path_buf());
        assert!(matches!(
            provider.snapshot().await,
            Err(CollaboratorError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_ranker_is_deterministic() {
        let markets = vec![
            CandidateMarket {
                id: "boise-id".to_string(),
                population: 200_000,
                density: 2.0,
                growth_rate: 5.0,
            },
            CandidateMarket {
                id: "austin-tx".to_string(),
                population: 900_000,
                density: 4.0,
                growth_rate: 3.0,
            },
        ];
        let ranker = StaticDirectoryRanker::new(markets.clone());
        let first = ranker.rank_top(&markets, 2).await.unwrap();
        assert_eq!(first, vec!["austin-tx", "boise-id"]);
        assert_eq!(ranker.rank_top(&markets, 2).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_reports() {
        let report = EngineReport::Optimization {
            run_id: uuid::Uuid::nil(),
            timestamp: chrono::Utc::now(),
            phase_before: "seed".to_string(),
            criteria: crate::engine::evaluator::Evaluation {
                ready: false,
                passed: vec![],
                failed: vec![],
                required: 1,
            },
            recommendations: vec![],
        };
        LogNotifier.notify(&report).await.unwrap();
    }
}
