//! # Engine Configuration
//!
//! Run-level settings for the orchestrator and swarm. Environment toggles
//! are read once at run start via [`EngineConfig::from_env`] and never
//! re-read mid-run.

use crate::models::ModelRouter;
use serde::{Deserialize, Serialize};

/// Default per-call model timeout (complex tasks need minutes, not seconds)
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;

/// Default character budget for injected RAG context
pub const DEFAULT_RAG_CHAR_BUDGET: usize = 2000;

/// Configuration for one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run model calls against the offline deterministic stub instead of
    /// the network transport
    #[serde(default)]
    pub offline: bool,
    /// Write trace events to the JSONL sink (false selects the null sink)
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,
    /// Path of the append-only trace file
    #[serde(default = "default_trace_path")]
    pub trace_path: String,
    /// Timeout for a single model invocation, in seconds
    #[serde(default = "default_timeout")]
    pub model_timeout_secs: u64,
    /// Maximum transport retries before falling back to the offline stub
    #[serde(default = "default_retries")]
    pub max_model_retries: u32,
    /// Re-prompt attempts after a validation failure before the phase fails
    #[serde(default = "default_retries")]
    pub max_validation_retries: u32,
    /// Retrieved chunks per RAG query
    #[serde(default = "default_top_k")]
    pub rag_top_k: usize,
    /// Total character budget for injected RAG context
    #[serde(default = "default_rag_budget")]
    pub rag_char_budget: usize,
    /// Model routing tables
    #[serde(default)]
    pub router: ModelRouter,
}

fn default_true() -> bool {
    true
}

fn default_trace_path() -> String {
    ".conductor/trace.jsonl".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    2
}

fn default_top_k() -> usize {
    4
}

fn default_rag_budget() -> usize {
    DEFAULT_RAG_CHAR_BUDGET
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offline: false,
            tracing_enabled: true,
            trace_path: default_trace_path(),
            model_timeout_secs: default_timeout(),
            max_model_retries: default_retries(),
            max_validation_retries: default_retries(),
            rag_top_k: default_top_k(),
            rag_char_budget: default_rag_budget(),
            router: ModelRouter::default(),
        }
    }
}

impl EngineConfig {
    /// Read the environment-level toggles once, at run start
    ///
    /// `CONDUCTOR_OFFLINE=1` selects the stub transport;
    /// `CONDUCTOR_TRACE=0` disables the JSONL sink;
    /// `CONDUCTOR_TRACE_PATH` overrides the trace file location.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("CONDUCTOR_OFFLINE") {
            config.offline = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("CONDUCTOR_TRACE") {
            config.tracing_enabled = !(v == "0" || v.eq_ignore_ascii_case("false"));
        }
        if let Ok(v) = std::env::var("CONDUCTOR_TRACE_PATH") {
            config.trace_path = v;
        }
        config
    }

    /// Offline config with tracing kept in memory-friendly defaults; used
    /// heavily by tests
    pub fn offline() -> Self {
        Self {
            offline: true,
            tracing_enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.offline);
        assert!(config.tracing_enabled);
        assert_eq!(config.model_timeout_secs, 120);
        assert_eq!(config.rag_char_budget, 2000);
    }

    #[test]
    fn test_offline_preset() {
        let config = EngineConfig::offline();
        assert!(config.offline);
        assert!(!config.tracing_enabled);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"offline": true}"#).unwrap();
        assert!(config.offline);
        assert_eq!(config.max_validation_retries, 2);
        assert_eq!(config.rag_top_k, 4);
    }
}
