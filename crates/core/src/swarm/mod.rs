//! # Swarm Execution
//!
//! Decomposes one request into an acyclic task graph and executes it with
//! dependency-aware concurrency over a shared blackboard. Independent tasks
//! run in parallel; a failed task propagates to its transitive dependents
//! as `skipped`, and completed outputs are synthesized in dependency order.

pub mod blackboard;
pub mod manager;
pub mod task;

pub use blackboard::{Blackboard, Observation};
pub use manager::{SwarmManager, SwarmResult};
pub use task::{Task, TaskGraph, TaskRecord, TaskStatus};
