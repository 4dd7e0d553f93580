//! # Agent Definitions
//!
//! The closed table mapping agent kinds to their system prompts and output
//! schemas. Prompt text is bundled at compile time; because the table is
//! keyed by enums, an agent kind with no prompt or schema cannot exist.

pub mod prompts;

use crate::models::{AgentKind, Phase, Specialty};

/// Static definition of one agent: identity, prompt, output contract
#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    /// Stable id used in traces and model-routing overrides
    pub id: &'static str,
    /// System prompt injected ahead of all run context
    pub system_prompt: &'static str,
    /// Name of the JSON Schema the agent's output must satisfy
    pub schema_name: &'static str,
}

const ANALYST: AgentSpec = AgentSpec {
    id: "analyst",
    system_prompt: prompts::ANALYST,
    schema_name: "analyst",
};

const ARCHITECT: AgentSpec = AgentSpec {
    id: "architect",
    system_prompt: prompts::ARCHITECT,
    schema_name: "architect",
};

const IMPLEMENTER: AgentSpec = AgentSpec {
    id: "implementer",
    system_prompt: prompts::IMPLEMENTER,
    schema_name: "implementer",
};

const TESTER: AgentSpec = AgentSpec {
    id: "tester",
    system_prompt: prompts::TESTER,
    schema_name: "tester",
};

const FRONTEND: AgentSpec = AgentSpec {
    id: "frontend",
    system_prompt: prompts::FRONTEND,
    schema_name: "specialist",
};

const BACKEND: AgentSpec = AgentSpec {
    id: "backend",
    system_prompt: prompts::BACKEND,
    schema_name: "specialist",
};

const DEVOPS: AgentSpec = AgentSpec {
    id: "devops",
    system_prompt: prompts::DEVOPS,
    schema_name: "specialist",
};

const DECOMPOSER: AgentSpec = AgentSpec {
    id: "decomposer",
    system_prompt: prompts::DECOMPOSER,
    schema_name: "decomposition",
};

const CUSTOM: AgentSpec = AgentSpec {
    id: "custom",
    system_prompt: prompts::CUSTOM,
    schema_name: "custom",
};

/// Agent for one pipeline phase
pub fn phase_spec(phase: Phase) -> &'static AgentSpec {
    match phase {
        Phase::Analyst => &ANALYST,
        Phase::Architect => &ARCHITECT,
        Phase::Implementer => &IMPLEMENTER,
        Phase::Tester => &TESTER,
    }
}

/// Agent for one specialist
pub fn specialty_spec(specialty: Specialty) -> &'static AgentSpec {
    match specialty {
        Specialty::Frontend => &FRONTEND,
        Specialty::Backend => &BACKEND,
        Specialty::Devops => &DEVOPS,
    }
}

/// Agent executing one swarm task
pub fn task_spec(kind: AgentKind) -> &'static AgentSpec {
    match kind.phase() {
        Some(phase) => phase_spec(phase),
        None => &CUSTOM,
    }
}

/// The ReAct-style decomposition agent used by swarm runs
pub fn decomposer_spec() -> &'static AgentSpec {
    &DECOMPOSER
}

/// All registered agents (diagnostics and prompt seeding)
pub fn all_specs() -> [&'static AgentSpec; 9] {
    [
        &ANALYST, &ARCHITECT, &IMPLEMENTER, &TESTER, &FRONTEND, &BACKEND, &DEVOPS, &DECOMPOSER,
        &CUSTOM,
    ]
}
