//! Catalog validation.
//!
//! Structural checks run after deserialization and before the catalog is
//! frozen. Errors prevent the catalog from being used; warnings are
//! reported and, in strict mode, promoted to errors.

use std::collections::BTreeSet;

use crate::catalog::schema::{CatalogConfig, MarketPolicy, PhaseDefinition};
use crate::error::{Severity, ValidationIssue};
use crate::snapshot::vocabulary;

/// Result of a validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Issues that prevent the catalog from being used.
    pub errors: Vec<ValidationIssue>,
    /// Issues worth surfacing that do not block loading.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns whether the catalog passed validation.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Catalog validator.
#[derive(Debug)]
pub struct Validator {
    strict: bool,
    issues: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a validator. In strict mode warnings become errors.
    #[must_use]
    pub const fn new(strict: bool) -> Self {
        Self {
            strict,
            issues: Vec::new(),
        }
    }

    /// Validates a catalog document.
    #[must_use]
    pub fn validate(mut self, config: &CatalogConfig) -> ValidationReport {
        self.check_settings(config);
        self.check_phase_set(&config.phases);
        for (i, phase) in config.phases.iter().enumerate() {
            self.check_phase(i, phase);
        }

        let mut report = ValidationReport::default();
        for issue in self.issues {
            let severity = if self.strict {
                Severity::Error
            } else {
                issue.severity
            };
            match severity {
                Severity::Error => report.errors.push(ValidationIssue { severity, ..issue }),
                Severity::Warning => report.warnings.push(issue),
            }
        }
        report
    }

    fn check_settings(&mut self, config: &CatalogConfig) {
        let p = config.settings.pass_fraction;
        if !p.is_finite() || p <= 0.0 || p > 1.0 {
            self.error(
                "settings.pass_fraction",
                format!("must be within (0, 1], got {p}"),
            );
        }
        if config.settings.evaluation_interval.is_zero() {
            self.error("settings.evaluation_interval", "must be non-zero".to_string());
        }
        if config.settings.retry.max_attempts == 0 {
            self.error("settings.retry.max_attempts", "must be at least 1".to_string());
        }

        let mut seen = BTreeSet::new();
        for (i, market) in config.settings.collaborators.candidate_markets.iter().enumerate() {
            if market.id.is_empty() {
                self.error(
                    format!("settings.collaborators.candidate_markets[{i}]"),
                    "market id is empty".to_string(),
                );
            }
            if !seen.insert(market.id.clone()) {
                self.error(
                    format!("settings.collaborators.candidate_markets[{i}]"),
                    format!("duplicate market id '{}'", market.id),
                );
            }
        }
    }

    fn check_phase_set(&mut self, phases: &[PhaseDefinition]) {
        if phases.is_empty() {
            self.warn("phases", "catalog contains no phases".to_string());
            return;
        }

        let mut ids = BTreeSet::new();
        for (i, phase) in phases.iter().enumerate() {
            if phase.id.is_empty() {
                self.error(format!("phases[{i}].id"), "phase id is empty".to_string());
            }
            if !ids.insert(phase.id.clone()) {
                self.error(
                    format!("phases[{i}].id"),
                    format!("duplicate phase id '{}'", phase.id),
                );
            }
        }

        // Orders must increase by exactly 1 in file order: the executor
        // resolves the successor as `order + 1`, so a gap would silently
        // turn the phase before it terminal.
        for window in phases.windows(2) {
            if window[1].order.checked_sub(window[0].order) != Some(1) {
                self.error(
                    "phases[].order",
                    format!(
                        "phase '{}' (order {}) does not follow '{}' (order {}); orders must increase by exactly 1",
                        window[1].id, window[1].order, window[0].id, window[0].order
                    ),
                );
            }
        }
    }

    fn check_phase(&mut self, i: usize, phase: &PhaseDefinition) {
        match &phase.market_policy {
            MarketPolicy::SelectTop { count } => {
                if *count == 0 {
                    self.error(
                        format!("phases[{i}].market_policy"),
                        "select_top count must be at least 1".to_string(),
                    );
                }
            }
            MarketPolicy::Explicit(list) => {
                let mut seen = BTreeSet::new();
                for market in list {
                    if !seen.insert(market) {
                        self.error(
                            format!("phases[{i}].market_policy"),
                            format!("duplicate market '{market}' in explicit list"),
                        );
                    }
                }
            }
            MarketPolicy::None => {}
        }

        let mut metrics = BTreeSet::new();
        for (j, criterion) in phase.success_criteria.iter().enumerate() {
            let path = format!("phases[{i}].success_criteria[{j}]");
            if criterion.metric.is_empty() {
                self.error(path.clone(), "criterion metric is empty".to_string());
            }
            if !criterion.threshold.is_finite() {
                self.error(
                    path.clone(),
                    format!("threshold {} is not finite", criterion.threshold),
                );
            }
            if !metrics.insert(criterion.metric.clone()) {
                self.warn(
                    path.clone(),
                    format!("metric '{}' appears in more than one criterion", criterion.metric),
                );
            }
            if !vocabulary::ALL.contains(&criterion.metric.as_str()) {
                self.warn(
                    path,
                    format!(
                        "metric '{}' is outside the documented vocabulary",
                        criterion.metric
                    ),
                );
            }
        }

        if phase.success_criteria.is_empty() {
            self.warn(
                format!("phases[{i}].success_criteria"),
                format!("phase '{}' is ungated and will always be ready", phase.id),
            );
        }
    }

    fn error(&mut self, path: impl Into<String>, message: String) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message,
            severity: Severity::Error,
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: String) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message,
            severity: Severity::Warning,
        });
    }
}
