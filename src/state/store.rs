//! Durable state storage.
//!
//! The JSON file store rewrites the whole document atomically on every
//! persist: write to a temporary sibling, fsync, rename over the target,
//! fsync the directory. A crash mid-write leaves the previous document
//! intact, so the engine always restarts from last-known-good state.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::StateError;
use crate::state::EngineState;

/// Durable record of engine state.
///
/// Writes happen only from the transition executor and the end-of-run
/// timestamp update; reads happen at startup and from the status
/// surfaces.
pub trait StateStore: Send + Sync {
    /// Loads the persisted state, or `None` when no document exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the document exists but cannot be read or
    /// deserialized.
    fn load(&self) -> Result<Option<EngineState>, StateError>;

    /// Persists the full state document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or the atomic rename fails. The
    /// caller must treat the transition as uncommitted.
    fn persist(&self, state: &EngineState) -> Result<(), StateError>;
}

// ============================================================================
// JSON File Store
// ============================================================================

/// File-backed store keeping the state as a single JSON document.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Creates a store at the given path. The file is created on first
    /// persist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<EngineState>, StateError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::Io(e)),
        };
        let state = serde_json::from_str(&raw).map_err(|e| StateError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(state))
    }

    fn persist(&self, state: &EngineState) -> Result<(), StateError> {
        let tmp = self.tmp_path();
        let body = serde_json::to_vec_pretty(state)?;

        // Write-to-temp + fsync + rename for crash safety
        let mut file = File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;

        // fsync the directory to ensure the rename is durable
        if let Some(dir) = self.path.parent() {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }

        debug!(path = %self.path.display(), "engine state persisted");
        Ok(())
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Volatile store for tests and dry runs. Can be told to fail persists
/// to exercise the discard-on-write-failure path.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<EngineState>>,
    fail_persist: std::sync::atomic::AtomicBool,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent persist fail with an I/O error.
    pub fn fail_next_persists(&self, fail: bool) {
        self.fail_persist
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<EngineState>, StateError> {
        Ok(self.inner.lock().map_or(None, |guard| (*guard).clone()))
    }

    fn persist(&self, state: &EngineState) -> Result<(), StateError> {
        if self.fail_persist.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StateError::Io(std::io::Error::other(
                "simulated persist failure",
            )));
        }
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(state.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn state(phase: &str) -> EngineState {
        EngineState {
            current_phase: phase.to_string(),
            active_markets: BTreeSet::from(["austin-tx".to_string()]),
            enabled_features: BTreeSet::new(),
            transition_history: vec![],
            last_evaluation: None,
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state.json"));
        let s = state("seed");
        store.persist(&s).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), s);
    }

    #[test]
    fn test_persist_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("state.json"));
        store.persist(&state("seed")).unwrap();
        store.persist(&state("local")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().current_phase, "local");
        // No stray temp file left behind
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonStateStore::new(path);
        assert!(matches!(store.load(), Err(StateError::Corrupt { .. })));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_none());
        store.persist(&state("seed")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().current_phase, "seed");
    }

    #[test]
    fn test_memory_store_simulated_failure() {
        let store = MemoryStateStore::new();
        store.persist(&state("seed")).unwrap();
        store.fail_next_persists(true);
        assert!(store.persist(&state("local")).is_err());
        // Prior document untouched
        assert_eq!(store.load().unwrap().unwrap().current_phase, "seed");
    }
}
