//! Metrics snapshots.
//!
//! A snapshot is a flat map from metric name to a numeric or boolean
//! value, produced fresh by the metrics provider on each evaluation run.
//! Snapshots are never mutated and are persisted only embedded in the
//! transition history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Documented metric vocabulary.
///
/// Criteria may reference any name, but these are the metrics the
/// surrounding services are known to emit. Unknown names in a snapshot
/// are carried but ignored; names required by the active phase's
/// criteria and missing from the snapshot fail those criteria.
pub mod vocabulary {
    /// Days since the operation went live.
    pub const DAYS_RUNNING: &str = "daysRunning";
    /// Number of currently paying customers.
    pub const PAYING_CUSTOMERS: &str = "payingCustomers";
    /// Monthly recurring revenue in account currency.
    pub const MONTHLY_RECURRING_REVENUE: &str = "monthlyRecurringRevenue";
    /// Lead-to-customer conversion rate, percent.
    pub const CONVERSION_RATE: &str = "conversionRate";
    /// Monthly customer churn rate, percent.
    pub const CHURN_RATE: &str = "churnRate";
    /// Trailing system uptime, percent.
    pub const SYSTEM_UPTIME: &str = "systemUptime";

    /// All documented metric names.
    pub const ALL: [&str; 6] = [
        DAYS_RUNNING,
        PAYING_CUSTOMERS,
        MONTHLY_RECURRING_REVENUE,
        CONVERSION_RATE,
        CHURN_RATE,
        SYSTEM_UPTIME,
    ];
}

/// A single metric value: a float or a flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Boolean flag metric (e.g. a feature health check).
    Flag(bool),
    /// Numeric metric.
    Number(f64),
}

impl MetricValue {
    /// Returns the value as a float for threshold comparison.
    ///
    /// Flags coerce to `1.0` / `0.0` so boolean metrics can participate
    /// in comparator-based criteria.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Number(n) => n,
            Self::Flag(true) => 1.0,
            Self::Flag(false) => 0.0,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for MetricValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Immutable KPI snapshot taken at the start of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Metric name to value. `BTreeMap` keeps serialized output stable.
    pub values: BTreeMap<String, MetricValue>,
}

impl MetricsSnapshot {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn now(values: BTreeMap<String, MetricValue>) -> Self {
        Self {
            timestamp: Utc::now(),
            values,
        }
    }

    /// Returns the metric value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.values.get(name).copied()
    }

    /// Returns the metric as a float, coercing flags.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).map(MetricValue::as_f64)
    }
}

/// Builder-style helper for tests and the file-backed provider.
impl FromIterator<(String, MetricValue)> for MetricsSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, MetricValue)>>(iter: T) -> Self {
        Self::now(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(name: &str, value: MetricValue) -> MetricsSnapshot {
        std::iter::once((name.to_string(), value)).collect()
    }

    #[test]
    fn test_number_roundtrip() {
        let snap = snapshot_with(vocabulary::CHURN_RATE, MetricValue::Number(4.5));
        assert_eq!(snap.get_f64(vocabulary::CHURN_RATE), Some(4.5));
    }

    #[test]
    fn test_flag_coercion() {
        let snap = snapshot_with("backupHealthy", MetricValue::Flag(true));
        assert_eq!(snap.get_f64("backupHealthy"), Some(1.0));

        let snap = snapshot_with("backupHealthy", MetricValue::Flag(false));
        assert_eq!(snap.get_f64("backupHealthy"), Some(0.0));
    }

    #[test]
    fn test_missing_metric() {
        let snap = snapshot_with(vocabulary::CHURN_RATE, MetricValue::Number(4.5));
        assert_eq!(snap.get(vocabulary::SYSTEM_UPTIME), None);
    }

    #[test]
    fn test_untagged_deserialization() {
        let json = r#"{"timestamp":"2026-01-15T00:00:00Z","values":{"churnRate":5.0,"backupHealthy":true}}"#;
        let snap: MetricsSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.get("churnRate"), Some(MetricValue::Number(5.0)));
        assert_eq!(snap.get("backupHealthy"), Some(MetricValue::Flag(true)));
    }

    #[test]
    fn test_vocabulary_complete() {
        assert_eq!(vocabulary::ALL.len(), 6);
        assert!(vocabulary::ALL.contains(&"monthlyRecurringRevenue"));
    }
}
