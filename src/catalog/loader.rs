//! Catalog loader.
//!
//! Loading pipeline:
//! 1. Read raw file content (size-limited, UTF-8 BOM tolerated)
//! 2. Environment variable substitution on raw text (`${VAR}`)
//! 3. YAML parsing
//! 4. Deserialization to typed catalog
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::schema::CatalogConfig;
use crate::catalog::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the catalog loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum catalog file size in bytes.
    pub max_file_size: usize,

    /// Treat warnings as errors.
    pub strict: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_file_size: env_or("STAGEGATE_MAX_CATALOG_SIZE", 1024 * 1024),
            strict: false,
        }
    }
}

/// Result of loading a catalog file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated catalog document.
    pub config: Arc<CatalogConfig>,

    /// Warnings encountered during loading and validation.
    pub warnings: Vec<String>,
}

/// Catalog loader.
///
/// Handles the full pipeline from YAML file to frozen `CatalogConfig`.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    options: LoaderOptions,
}

impl CatalogLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a catalog file and returns the frozen configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, exceeds the size
    /// limit, fails to parse, references an unset environment variable,
    /// or fails validation.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.options.max_file_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.options.max_file_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        // Environment variable substitution before YAML parsing
        let substituted = substitute_env(raw, path)?;

        self.load_str(&substituted, path)
    }

    /// Loads a catalog from an in-memory YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error on parse or validation failure.
    pub fn load_str(&self, yaml: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let config: CatalogConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let report = Validator::new(self.options.strict).validate(&config);
        if !report.errors.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: report.errors,
            });
        }

        Ok(LoadResult {
            config: Arc::new(config),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        })
    }
}

// ============================================================================
// Environment Substitution
// ============================================================================

/// Replaces `${VAR}` references in raw catalog text with the variable's
/// value. An unset variable is a hard error.
fn substitute_env(raw: &str, path: &Path) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated reference, pass through verbatim
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let var = &after[..end];
        match std::env::var(var) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                return Err(ConfigError::EnvVarNotSet {
                    var: var.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Reads a usize setting from the environment with a default.
fn env_or(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r"
phases:
  - id: seed
    order: 0
    name: Seed
";

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_minimal() {
        let f = write_temp(MINIMAL);
        let result = CatalogLoader::with_defaults().load(f.path()).unwrap();
        assert_eq!(result.config.phases.len(), 1);
        assert_eq!(result.config.phases[0].id, "seed");
    }

    #[test]
    fn test_missing_file() {
        let err = CatalogLoader::with_defaults()
            .load(Path::new("/nonexistent/catalog.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let f = write_temp("phases: [not: valid: yaml: here");
        let err = CatalogLoader::with_defaults().load(f.path()).unwrap_err();
        match err {
            ConfigError::ParseError { path, .. } => assert_eq!(path, f.path()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bom_stripped() {
        let f = write_temp(&format!("\u{feff}{MINIMAL}"));
        let result = CatalogLoader::with_defaults().load(f.path()).unwrap();
        assert_eq!(result.config.phases.len(), 1);
    }

    #[test]
    fn test_size_limit() {
        let f = write_temp(MINIMAL);
        let loader = CatalogLoader::new(LoaderOptions {
            max_file_size: 4,
            strict: false,
        });
        let err = loader.load(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_env_substitution() {
        // PATH is present in any environment this suite runs in
        let path_value = std::env::var("PATH").unwrap();
        let raw = "search: ${PATH}\n";
        let out = substitute_env(raw, Path::new("test.yaml")).unwrap();
        assert_eq!(out, format!("search: {path_value}\n"));
    }

    #[test]
    fn test_env_substitution_unset_is_error() {
        let raw = "name: ${STAGEGATE_TEST_UNSET_VAR_XYZ}\n";
        let err = substitute_env(raw, Path::new("test.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotSet { .. }));
    }

    #[test]
    fn test_env_substitution_unterminated_passthrough() {
        let raw = "name: ${UNTERMINATED\n";
        let out = substitute_env(raw, Path::new("test.yaml")).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let yaml = r"
phases:
  - id: seed
    order: 0
    name: Seed
  - id: seed
    order: 1
    name: Duplicate
";
        let f = write_temp(yaml);
        let err = CatalogLoader::with_defaults().load(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
