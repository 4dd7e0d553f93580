//! # Trace Events
//!
//! The append-only audit trail for a run. Every routing decision, prompt,
//! response, validation outcome, task transition, and error becomes one
//! immutable [`TraceEvent`], written through an injected [`TraceSink`].
//!
//! Sinks are passed explicitly to every component with a lifecycle tied to
//! one run; there is no global trace state. The JSONL wire shape is one
//! object per line: `{"ts": ISO8601, "kind": ..., "ref": ..., ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Kind of trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A model was selected for a phase or task
    Route,
    /// Full prompt sent to the model
    Prompt,
    /// Raw model response
    Response,
    /// Schema validation outcome
    Validation,
    /// Error local to a phase or task, or fatal to the run
    Error,
    /// A swarm task changed status
    TaskStatus,
    /// Run lifecycle: started
    RunStarted,
    /// Run lifecycle: finished (either outcome)
    RunCompleted,
}

/// One immutable record in the trace
///
/// Events across concurrent tasks interleave by append time; `ref` carries
/// the phase or task id so a per-task view can be reconstructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Append timestamp
    pub ts: DateTime<Utc>,
    /// Kind of event
    pub kind: TraceKind,
    /// Phase name or task id this event belongs to
    #[serde(rename = "ref")]
    pub ref_id: String,
    /// Kind-specific fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, ref_id: &str) -> Self {
        Self {
            ts: Utc::now(),
            kind,
            ref_id: ref_id.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn route(ref_id: &str, model: &str) -> Self {
        Self::new(TraceKind::Route, ref_id).with_payload(serde_json::json!({ "model": model }))
    }

    pub fn prompt(ref_id: &str, text: &str) -> Self {
        Self::new(TraceKind::Prompt, ref_id).with_payload(serde_json::json!({ "text": text }))
    }

    pub fn response(ref_id: &str, text: &str) -> Self {
        Self::new(TraceKind::Response, ref_id).with_payload(serde_json::json!({ "text": text }))
    }

    pub fn validation(ref_id: &str, schema: &str, valid: bool, errors: &[String]) -> Self {
        Self::new(TraceKind::Validation, ref_id).with_payload(serde_json::json!({
            "schema": schema,
            "valid": valid,
            "errors": errors,
        }))
    }

    pub fn error(ref_id: &str, message: &str) -> Self {
        Self::new(TraceKind::Error, ref_id).with_payload(serde_json::json!({ "message": message }))
    }

    pub fn task_status(ref_id: &str, status: &str) -> Self {
        Self::new(TraceKind::TaskStatus, ref_id)
            .with_payload(serde_json::json!({ "status": status }))
    }
}

/// Append-only event sink
///
/// Implementations must be safe for concurrent appenders; each event is a
/// fully-formed independent record. A sink failure never fails the run.
pub trait TraceSink: Send + Sync {
    fn append(&self, event: TraceEvent);
}

/// File-backed JSONL sink, one JSON object per line
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) the trace file in append mode
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TraceSink for JsonlSink {
    fn append(&self, event: TraceEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("trace event serialization failed: {}", e);
                return;
            }
        };
        if let Ok(mut file) = self.file.lock() {
            if let Err(e) = writeln!(file, "{}", line) {
                tracing::warn!("trace append failed: {}", e);
            }
        }
    }
}

/// Sink that drops every event; selected when tracing is switched off
pub struct NullSink;

impl TraceSink for NullSink {
    fn append(&self, _event: TraceEvent) {}
}

/// In-memory sink for tests and diagnostics
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of one kind, in append order
    pub fn of_kind(&self, kind: TraceKind) -> Vec<TraceEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl TraceSink for MemorySink {
    fn append(&self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_wire_shape_uses_ref_key() {
        let event = TraceEvent::route("analyst", "claude-sonnet-4-20250514");
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("ref").is_some());
        assert!(json.get("ref_id").is_none());
        assert_eq!(json["kind"], "route");
        assert_eq!(json["payload"]["model"], "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_jsonl_sink_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let sink = JsonlSink::open(&path).unwrap();

        sink.append(TraceEvent::route("task1", "m"));
        sink.append(TraceEvent::error("task2", "boom"));

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("ts").is_some());
            assert!(value.get("ref").is_some());
        }
    }

    #[test]
    fn test_memory_sink_preserves_append_order() {
        let sink = MemorySink::new();
        sink.append(TraceEvent::new(TraceKind::RunStarted, "run"));
        sink.append(TraceEvent::task_status("t1", "running"));
        let events = sink.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TraceKind::RunStarted);
        assert_eq!(events[1].ref_id, "t1");
    }
}
