//! # Conductor Models
//!
//! Centralized model-selection types: the closed agent taxonomy, LLM
//! provider configuration, and the pure [`ModelRouter`] lookup.
//!
//! Agent selection is a closed enum rather than free-form strings, so an
//! unknown agent kind is a deserialization error at the boundary instead of
//! a runtime surprise deep inside a run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One stage of the fixed linear pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analyst,
    Architect,
    Implementer,
    Tester,
}

impl Phase {
    /// Pipeline order, first to last
    pub fn all() -> [Phase; 4] {
        [
            Phase::Analyst,
            Phase::Architect,
            Phase::Implementer,
            Phase::Tester,
        ]
    }

    /// The phase after this one, or None at the end of the pipeline
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Analyst => Some(Phase::Architect),
            Phase::Architect => Some(Phase::Implementer),
            Phase::Implementer => Some(Phase::Tester),
            Phase::Tester => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Analyst => "analyst",
            Phase::Architect => "architect",
            Phase::Implementer => "implementer",
            Phase::Tester => "tester",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain specialist invoked within or alongside a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Frontend,
    Backend,
    Devops,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Frontend => "frontend",
            Specialty::Backend => "backend",
            Specialty::Devops => "devops",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of agent a swarm task delegates to
///
/// `Custom` covers decomposer-invented work that maps onto no fixed phase;
/// it runs with the generalist prompt and the free-form `custom` schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Analyst,
    Architect,
    Implementation,
    Testing,
    Custom,
}

impl AgentKind {
    /// The pipeline phase this task kind corresponds to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            AgentKind::Analyst => Some(Phase::Analyst),
            AgentKind::Architect => Some(Phase::Architect),
            AgentKind::Implementation => Some(Phase::Implementer),
            AgentKind::Testing => Some(Phase::Tester),
            AgentKind::Custom => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Analyst => "analyst",
            AgentKind::Architect => "architect",
            AgentKind::Implementation => "implementation",
            AgentKind::Testing => "testing",
            AgentKind::Custom => "custom",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    OpenRouter,
}

impl LlmProvider {
    /// Default model when neither a phase nor a global model is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI | LlmProvider::OpenRouter)
    }
}

/// Configuration for one LLM invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: LlmProvider::Anthropic.default_model().to_string(),
            base_url: None,
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }
}

/// Pure (phase, specialty) -> model lookup
///
/// Precedence, highest first: explicit per-call override, specialty
/// default, phase default, global model, provider default. The router holds
/// static tables only; routing has no side effects beyond the trace entry
/// the caller writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRouter {
    /// Global LLM provider
    #[serde(default)]
    pub global_provider: LlmProvider,
    /// Global model override for all agents
    pub global_model: Option<String>,
    /// Base URL override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    /// Fixed model per phase
    #[serde(default)]
    pub phase_models: HashMap<Phase, String>,
    /// Override table per specialty
    #[serde(default)]
    pub specialty_models: HashMap<Specialty, String>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::Anthropic,
            global_model: None,
            base_url: None,
            phase_models: HashMap::new(),
            specialty_models: HashMap::new(),
        }
    }
}

impl ModelRouter {
    /// Resolve the model for one phase invocation
    pub fn route(
        &self,
        phase: Phase,
        specialty: Option<Specialty>,
        override_model: Option<&str>,
    ) -> ModelConfig {
        let model = override_model
            .map(str::to_string)
            .or_else(|| specialty.and_then(|s| self.specialty_models.get(&s).cloned()))
            .or_else(|| self.phase_models.get(&phase).cloned())
            .or_else(|| self.global_model.clone())
            .unwrap_or_else(|| self.global_provider.default_model().to_string());

        ModelConfig {
            provider: self.global_provider.clone(),
            model,
            base_url: if self.global_provider.supports_base_url() {
                self.base_url.clone()
            } else {
                None
            },
        }
    }

    /// Resolve the model for a swarm task; `Custom` tasks fall through the
    /// phase table to the global default
    pub fn route_agent(
        &self,
        kind: AgentKind,
        specialty: Option<Specialty>,
        override_model: Option<&str>,
    ) -> ModelConfig {
        match kind.phase() {
            Some(phase) => self.route(phase, specialty, override_model),
            None => {
                let model = override_model
                    .map(str::to_string)
                    .or_else(|| specialty.and_then(|s| self.specialty_models.get(&s).cloned()))
                    .or_else(|| self.global_model.clone())
                    .unwrap_or_else(|| self.global_provider.default_model().to_string());
                ModelConfig {
                    provider: self.global_provider.clone(),
                    model,
                    base_url: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with_tables() -> ModelRouter {
        let mut router = ModelRouter {
            global_model: Some("global-model".to_string()),
            ..ModelRouter::default()
        };
        router
            .phase_models
            .insert(Phase::Architect, "architect-model".to_string());
        router
            .specialty_models
            .insert(Specialty::Backend, "backend-model".to_string());
        router
    }

    #[test]
    fn test_route_precedence() {
        let router = router_with_tables();

        // Explicit override beats everything
        let cfg = router.route(Phase::Architect, Some(Specialty::Backend), Some("forced"));
        assert_eq!(cfg.model, "forced");

        // Specialty beats phase
        let cfg = router.route(Phase::Architect, Some(Specialty::Backend), None);
        assert_eq!(cfg.model, "backend-model");

        // Phase beats global
        let cfg = router.route(Phase::Architect, None, None);
        assert_eq!(cfg.model, "architect-model");

        // Global beats provider default
        let cfg = router.route(Phase::Tester, None, None);
        assert_eq!(cfg.model, "global-model");
    }

    #[test]
    fn test_route_falls_back_to_provider_default() {
        let router = ModelRouter::default();
        let cfg = router.route(Phase::Analyst, None, None);
        assert_eq!(cfg.model, LlmProvider::Anthropic.default_model());
    }

    #[test]
    fn test_route_agent_custom_uses_global() {
        let router = router_with_tables();
        let cfg = router.route_agent(AgentKind::Custom, None, None);
        assert_eq!(cfg.model, "global-model");
    }

    #[test]
    fn test_routing_is_pure() {
        let router = router_with_tables();
        let a = router.route(Phase::Analyst, None, None);
        let b = router.route(Phase::Analyst, None, None);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_agent_kind_string_tags() {
        let json = serde_json::to_string(&AgentKind::Implementation).unwrap();
        assert_eq!(json, "\"implementation\"");
        let back: AgentKind = serde_json::from_str("\"testing\"").unwrap();
        assert_eq!(back, AgentKind::Testing);
        assert!(serde_json::from_str::<AgentKind>("\"wizard\"").is_err());
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(Phase::Analyst.next(), Some(Phase::Architect));
        assert_eq!(Phase::Tester.next(), None);
    }
}
