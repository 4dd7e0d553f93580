//! # Engine Errors
//!
//! The error taxonomy for pipeline and swarm runs. Errors local to one
//! phase or task are contained and recorded on that phase/task; only
//! graph-level errors (empty request, bad decomposition, deadlock) abort
//! an entire run.

use thiserror::Error;

/// Errors surfaced by the orchestration engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request was empty or whitespace; rejected before any model call
    #[error("request is empty")]
    EmptyRequest,

    /// Output failed schema validation after all re-prompt attempts
    #[error("output for '{schema}' failed validation: {}", errors.join("; "))]
    Validation { schema: String, errors: Vec<String> },

    /// Model transport failed past retry and offline fallback
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// Decomposition produced an invalid task graph (cycle, unknown or
    /// duplicate ids); fatal, detected before any task is dispatched
    #[error("decomposition invalid: {0}")]
    Decomposition(String),

    /// Scheduling loop cannot make progress while tasks remain pending
    #[error("swarm deadlocked; stuck tasks: {}", stuck.join(", "))]
    Deadlock { stuck: Vec<String> },

    /// Anything else (IO, serialization at the boundary)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable string tag for the structured API error shape
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::EmptyRequest => "empty_request",
            EngineError::Validation { .. } => "validation",
            EngineError::ModelCall(_) => "model_call",
            EngineError::Decomposition(_) => "decomposition",
            EngineError::Deadlock { .. } => "deadlock",
            EngineError::Other(_) => "internal",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
