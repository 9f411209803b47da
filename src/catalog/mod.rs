//! Phase catalog: schema, loading, and validation.
//!
//! The catalog is the static, ordered list of phase definitions the
//! engine progresses through, together with the engine settings. It is
//! loaded once at startup, validated, and frozen behind an `Arc`.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{CatalogLoader, LoadResult, LoaderOptions};
pub use schema::{
    CandidateMarket, CatalogConfig, Comparator, Criterion, EngineSettings, MarketPolicy,
    PhaseCatalog, PhaseDefinition, RetrySettings,
};
pub use validation::{ValidationReport, Validator};
