//! Workspace inspection tools feeding agent context.

pub mod structure;

pub use structure::{summarize, StructureSummary};
