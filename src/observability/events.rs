//! Structured event stream for `stagegate`.
//!
//! Discrete, typed events emitted during engine operation. Events are
//! serialized as newline-delimited JSON (JSONL) and include a
//! monotonically increasing sequence number for ordering guarantees.
//! This stream is the durable operational record: advisor output is
//! recorded here, not on the engine state document.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::collaborators::Recommendation;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during `stagegate` operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so
/// consumers can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The engine has started and the scheduler is running.
    EngineStarted {
        /// When the engine started.
        timestamp: DateTime<Utc>,
        /// Phase the engine resumed in.
        phase: String,
        /// Evaluation interval in seconds.
        interval_secs: u64,
    },

    /// The engine has stopped.
    EngineStopped {
        /// When the engine stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// An evaluation run finished.
    EvaluationCompleted {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Run id.
        run_id: Uuid,
        /// Phase that was evaluated.
        phase: String,
        /// Whether the gate was satisfied.
        ready: bool,
        /// Criteria passed.
        passed: usize,
        /// Criteria total.
        total: usize,
    },

    /// A phase transition was applied and persisted.
    PhaseTransition {
        /// When the transition was applied.
        timestamp: DateTime<Utc>,
        /// Run id.
        run_id: Uuid,
        /// Phase id advanced from.
        from_phase: String,
        /// Phase id advanced to.
        to_phase: String,
        /// Markets newly activated.
        markets_activated: Vec<String>,
        /// Capability flags newly enabled.
        features_enabled: Vec<String>,
    },

    /// Advisory recommendations were issued for a not-ready phase.
    RecommendationsIssued {
        /// When the recommendations were issued.
        timestamp: DateTime<Utc>,
        /// Run id.
        run_id: Uuid,
        /// Phase the operation remains in.
        phase: String,
        /// The recommendations, best-first.
        recommendations: Vec<Recommendation>,
    },

    /// A scheduled or on-demand run was dropped.
    RunSkipped {
        /// When the trigger fired.
        timestamp: DateTime<Utc>,
        /// Why the run was dropped (e.g. `"already in progress"`).
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped
/// because observability must never crash the engine.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug — provide a manual impl.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that appends to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    ///
    /// Failures are silently dropped — observability must not crash the
    /// engine.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::EngineStarted {
            timestamp: DateTime::parse_from_rfc3339("2026-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            phase: "seed".to_owned(),
            interval_secs: 86_400,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "EngineStarted");
        assert_eq!(parsed["phase"], "seed");
    }

    #[test]
    fn emitter_writes_valid_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());

        let output = tw.contents();
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["type"], "EngineStarted");
        assert_eq!(parsed["interval_secs"], 86_400);
        assert_eq!(parsed["sequence"], 0);
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::EngineStopped {
            timestamp: Utc::now(),
            reason: "done".to_owned(),
        });

        assert_eq!(emitter.event_count(), 2);

        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
    }

    #[test]
    fn all_event_variants_serialize_to_valid_json() {
        let now = Utc::now();
        let run_id = Uuid::nil();
        let variants: Vec<Event> = vec![
            sample_event(),
            Event::EngineStopped {
                timestamp: now,
                reason: "shutdown".to_owned(),
            },
            Event::EvaluationCompleted {
                timestamp: now,
                run_id,
                phase: "seed".to_owned(),
                ready: false,
                passed: 3,
                total: 5,
            },
            Event::PhaseTransition {
                timestamp: now,
                run_id,
                from_phase: "seed".to_owned(),
                to_phase: "local".to_owned(),
                markets_activated: vec!["austin-tx".to_owned()],
                features_enabled: vec![],
            },
            Event::RecommendationsIssued {
                timestamp: now,
                run_id,
                phase: "seed".to_owned(),
                recommendations: vec![],
            },
            Event::RunSkipped {
                timestamp: now,
                reason: "already in progress".to_owned(),
            },
        ];

        for variant in &variants {
            let json = serde_json::to_string(variant).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(parsed.get("type").is_some(), "missing type tag: {json}");
        }
    }

    #[test]
    fn envelope_flattens_event_fields() {
        let envelope = EventEnvelope {
            sequence: 7,
            event: sample_event(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        // Flat structure — sequence, type, and event fields at the same level
        assert_eq!(parsed["sequence"], 7);
        assert_eq!(parsed["type"], "EngineStarted");
        assert_eq!(parsed["phase"], "seed");
        assert!(
            parsed.get("event").is_none(),
            "event field should be flattened"
        );
    }
}
