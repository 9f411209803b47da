//! Catalog schema types.
//!
//! These types are deserialized from YAML catalog files. A catalog file
//! carries the ordered phase definitions plus the engine settings that
//! govern evaluation cadence, readiness gating, and collaborator wiring.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Catalog Document
// ============================================================================

/// Root document for a `stagegate` catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogConfig {
    /// Engine settings (cadence, gating, collaborators).
    #[serde(default)]
    pub settings: EngineSettings,

    /// Ordered phase definitions.
    #[serde(default)]
    pub phases: Vec<PhaseDefinition>,
}

impl CatalogConfig {
    /// Returns the phase catalog view over this document.
    #[must_use]
    pub fn catalog(&self) -> PhaseCatalog<'_> {
        PhaseCatalog {
            phases: &self.phases,
        }
    }
}

// ============================================================================
// Phase Definitions
// ============================================================================

/// A discrete, ordered stage of business maturity.
///
/// Immutable once loaded. The engine never edits catalog entries; it only
/// reads them to score readiness and resolve expansion targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhaseDefinition {
    /// Stable identifier referenced by persisted state.
    pub id: String,

    /// Position in the progression. Strictly increasing across the catalog.
    pub order: u32,

    /// Human-readable phase name.
    pub name: String,

    /// Descriptive KPI targets. Not interpreted by the engine; carried for
    /// dashboards and notification context.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub target_kpis: IndexMap<String, f64>,

    /// Which markets this phase activates on entry.
    #[serde(default)]
    pub market_policy: MarketPolicy,

    /// Capability flags enabled on entry into this phase.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub feature_set: BTreeSet<String>,

    /// Gating criteria for advancing *out* of this phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<Criterion>,

    /// Opaque reference to the messaging template used by the outreach
    /// services once this phase is active. Never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_template: Option<String>,
}

/// Market activation policy for a phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPolicy {
    /// Activate no new markets on entry.
    #[default]
    None,

    /// Activate exactly these markets, in this order, skipping any that
    /// are already active.
    Explicit(Vec<String>),

    /// Ask the ranking collaborator for the top N candidates not yet
    /// active; deterministic fallback on failure.
    SelectTop {
        /// Number of markets to activate.
        count: usize,
    },
}

/// A single success criterion: compare a snapshot metric to a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Criterion {
    /// Metric name looked up in the snapshot.
    pub metric: String,

    /// Comparison direction.
    pub comparator: Comparator,

    /// Threshold the metric is compared against.
    pub threshold: f64,
}

/// Comparison direction for a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Passes when `actual >= threshold`.
    AtLeast,
    /// Passes when `actual <= threshold`.
    AtMost,
}

impl Comparator {
    /// Applies the comparison to an actual value.
    #[must_use]
    pub fn holds(self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => actual >= threshold,
            Self::AtMost => actual <= threshold,
        }
    }

    /// Display symbol used in logs and reports.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
        }
    }
}

// ============================================================================
// Catalog View
// ============================================================================

/// Ordered, validated view over a catalog's phases.
///
/// Constructed after validation, so lookups here assume unique ids and
/// strictly increasing order.
#[derive(Debug, Clone, Copy)]
pub struct PhaseCatalog<'a> {
    phases: &'a [PhaseDefinition],
}

impl<'a> PhaseCatalog<'a> {
    /// Creates a view over a validated phase slice.
    #[must_use]
    pub const fn new(phases: &'a [PhaseDefinition]) -> Self {
        Self { phases }
    }

    /// Returns the phases in catalog order.
    #[must_use]
    pub const fn phases(&self) -> &'a [PhaseDefinition] {
        self.phases
    }

    /// Returns the number of phases.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.phases.len()
    }

    /// Returns whether the catalog has no phases.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Returns the first phase in progression order.
    #[must_use]
    pub fn first(&self) -> Option<&'a PhaseDefinition> {
        self.phases.iter().min_by_key(|p| p.order)
    }

    /// Looks up a phase by id.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&'a PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Returns the phase with `order = current.order + 1`, if any.
    ///
    /// The last catalog entry is terminal: it has no successor.
    #[must_use]
    pub fn successor(&self, current: &PhaseDefinition) -> Option<&'a PhaseDefinition> {
        let next_order = current.order.checked_add(1)?;
        self.phases.iter().find(|p| p.order == next_order)
    }

    /// Returns whether the given phase is the terminal catalog entry.
    #[must_use]
    pub fn is_terminal(&self, phase: &PhaseDefinition) -> bool {
        self.successor(phase).is_none()
    }
}

// ============================================================================
// Engine Settings
// ============================================================================

/// Engine-wide settings carried alongside the phase definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineSettings {
    /// Fraction of a phase's criteria that must pass for readiness.
    /// Boundary-inclusive: `passed >= ceil(pass_fraction * total)`.
    #[serde(default = "default_pass_fraction")]
    pub pass_fraction: f64,

    /// Recurring evaluation interval (humantime string, e.g. `"24h"`).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub evaluation_interval: Duration,

    /// Path of the persisted state document.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Path of the JSONL engine event stream. `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log_path: Option<PathBuf>,

    /// Retry policy for collaborator calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Collaborator wiring.
    #[serde(default)]
    pub collaborators: CollaboratorSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pass_fraction: default_pass_fraction(),
            evaluation_interval: default_interval(),
            state_path: default_state_path(),
            event_log_path: None,
            retry: RetrySettings::default(),
            collaborators: CollaboratorSettings::default(),
        }
    }
}

fn default_pass_fraction() -> f64 {
    0.8
}

const fn default_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_state_path() -> PathBuf {
    PathBuf::from("stagegate-state.json")
}

/// Bounded-retry settings shared by all collaborator calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrySettings {
    /// Maximum attempts per call (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum random jitter added to each delay, in milliseconds.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    2
}
const fn default_base_delay_ms() -> u64 {
    500
}
const fn default_max_delay_ms() -> u64 {
    32_000
}
const fn default_jitter_ms() -> u64 {
    250
}
const fn default_call_timeout_ms() -> u64 {
    10_000
}

/// Collaborator wiring: endpoints for HTTP-backed collaborators, local
/// alternatives when an endpoint is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollaboratorSettings {
    /// HTTP endpoint returning a metrics snapshot. When absent,
    /// `metrics_file` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_endpoint: Option<String>,

    /// JSON file to read the metrics snapshot from (offline operation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,

    /// HTTP endpoint for the ranking collaborator. When absent, the
    /// static directory with deterministic fallback ranking is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranker_endpoint: Option<String>,

    /// Candidate market directory for offline ranking.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_markets: Vec<CandidateMarket>,

    /// HTTP endpoint for the recommendation collaborator. When absent,
    /// recommendation generation is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommender_endpoint: Option<String>,

    /// Webhook for structured notifications. When absent, reports are
    /// written to the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifier_endpoint: Option<String>,
}

/// A market eligible for activation, with ranking attributes.
///
/// Supplied by the market directory; the engine does not own or edit
/// these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CandidateMarket {
    /// Stable market identifier (e.g. `"austin-tx"`).
    pub id: String,

    /// Resident population.
    #[serde(default)]
    pub population: u64,

    /// Small-business density score.
    #[serde(default)]
    pub density: f64,

    /// Year-over-year growth rate, percent.
    #[serde(default)]
    pub growth_rate: f64,
}

/// Serde adapter for humantime duration strings (`"24h"`, `"30m"`).
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(de)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
