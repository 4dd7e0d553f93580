//! # Conductor Core
//!
//! The engine behind Conductor: phase orchestration, swarm scheduling, and
//! the shared blackboard. All model access, schema gating, and tracing
//! live here; the server crate is a thin surface over this API.
//!
//! ## Architecture
//!
//! - `agents/` - Closed agent table: prompts and output schemas per kind
//! - `orchestrator` - Linear phase pipeline with Q&A bypass
//! - `swarm/` - Task graph decomposition, concurrent scheduling, blackboard
//! - `llm/` - Transport seam: HTTP providers plus the offline stub
//! - `context` - Prompt assembly and keyword retrieval
//! - `validate` - JSON Schema gate on every agent output
//! - `trace` - Append-only JSONL run audit trail
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conductor_core::{EngineConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(EngineConfig::from_env())?;
//! let result = orchestrator.run_pipeline("Build a stock tracker", None, None).await?;
//! ```

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod swarm;
pub mod tools;
pub mod trace;
pub mod validate;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use orchestrator::{Orchestrator, PipelineResult, Plan};
pub use swarm::{SwarmManager, SwarmResult};
