//! Default prompt texts bundled at compile time.

/// Golden Rules - constraints injected into every prompt
pub const GOLDEN_RULES: &str = include_str!("defaults/golden_rules.md");

/// Analyst - turns requests into requirements or direct answers
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Architect - component design from requirements
pub const ARCHITECT: &str = include_str!("defaults/architect.md");

/// Implementer - code from the design
pub const IMPLEMENTER: &str = include_str!("defaults/implementer.md");

/// Tester - tests from the implementation
pub const TESTER: &str = include_str!("defaults/tester.md");

/// Frontend specialist
pub const FRONTEND: &str = include_str!("defaults/frontend.md");

/// Backend specialist
pub const BACKEND: &str = include_str!("defaults/backend.md");

/// DevOps specialist
pub const DEVOPS: &str = include_str!("defaults/devops.md");

/// Decomposer - request to task graph
pub const DECOMPOSER: &str = include_str!("defaults/decomposer.md");

/// Generalist for custom swarm tasks
pub const CUSTOM: &str = include_str!("defaults/custom.md");
