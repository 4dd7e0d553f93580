//! # Orchestrator
//!
//! Drives the linear phase pipeline: analyst → architect → implementer →
//! tester. Each phase builds context, invokes the routed model, extracts a
//! JSON payload, and validates it against the phase schema. An analyst
//! answering in Q&A mode short-circuits the pipeline; a validation failure
//! triggers a bounded re-prompt with the errors appended before the run is
//! declared failed.

use crate::agents::{self, AgentSpec};
use crate::config::EngineConfig;
use crate::context::{ContextManager, Retriever};
use crate::error::{EngineError, EngineResult};
use crate::llm::{CompletionRequest, LlmClient};
use crate::models::{Phase, Specialty};
use crate::trace::{TraceEvent, TraceKind, TraceSink};
use crate::validate::{extract_payload, OutputValidator, ValidationResult};
use serde_json::Value;
use std::sync::Arc;

/// Progress of one phase invocation
///
/// Runs forward through the working states and lands on exactly one of the
/// terminal three: `AdvancePhase` (valid artifact), `AnswerReady` (Q&A
/// bypass), or `Failed` (validation rejected the output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Idle,
    BuildingContext,
    AwaitingModel,
    Validating,
    AdvancePhase,
    AnswerReady,
    Failed,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseState::AdvancePhase | PhaseState::AnswerReady | PhaseState::Failed
        )
    }
}

/// Ordered record of the phases run so far and their validated artifacts.
/// Mutated only by appending the next phase's output.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    phases: Vec<(Phase, Value)>,
}

impl Plan {
    pub fn append(&mut self, phase: Phase, artifact: Value) {
        self.phases.push((phase, artifact));
    }

    pub fn phases(&self) -> &[(Phase, Value)] {
        &self.phases
    }

    pub fn artifact(&self, phase: Phase) -> Option<&Value> {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, v)| v)
    }

    /// Prior outputs labeled for context assembly
    pub fn labeled(&self) -> Vec<(String, Value)> {
        self.phases
            .iter()
            .map(|(phase, value)| (phase.to_string(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// Outcome of one phase invocation
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Extracted payload; None when no JSON object could be found
    pub payload: Option<Value>,
    pub validation: ValidationResult,
    /// Direct answer when the phase short-circuited in Q&A mode
    pub answer: Option<String>,
    /// Terminal state the phase landed on
    pub state: PhaseState,
}

impl PhaseReport {
    fn terminal_state(validation: &ValidationResult, answer: &Option<String>) -> PhaseState {
        if answer.is_some() {
            PhaseState::AnswerReady
        } else if validation.valid {
            PhaseState::AdvancePhase
        } else {
            PhaseState::Failed
        }
    }
}

/// Final outcome of a pipeline run
#[derive(Debug, Clone)]
pub enum PipelineResult {
    /// Q&A bypass: the analyst answered directly, later phases skipped
    Answer { answer: String, plan: Plan },
    /// All phases produced validated artifacts
    Completed { plan: Plan },
}

/// Drives phases against the model transport
pub struct Orchestrator {
    config: EngineConfig,
    context: ContextManager,
    validator: OutputValidator,
    client: Arc<dyn LlmClient>,
    sink: Arc<dyn TraceSink>,
}

impl Orchestrator {
    /// Build with an explicit transport and sink (swarm and tests)
    pub fn with_client(
        config: EngineConfig,
        client: Arc<dyn LlmClient>,
        sink: Arc<dyn TraceSink>,
    ) -> anyhow::Result<Self> {
        let context = ContextManager::new(config.rag_top_k, config.rag_char_budget);
        let validator = OutputValidator::bundled()?;
        Ok(Self {
            config,
            context,
            validator,
            client,
            sink,
        })
    }

    /// Build from config alone, selecting transport and sink from its
    /// offline/tracing toggles
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let sink: Arc<dyn TraceSink> = if config.tracing_enabled {
            Arc::new(crate::trace::JsonlSink::open(&config.trace_path)?)
        } else {
            Arc::new(crate::trace::NullSink)
        };
        let client = crate::llm::client_for(&config, sink.clone());
        Self::with_client(config, client, sink)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> Arc<dyn TraceSink> {
        self.sink.clone()
    }

    /// Invoke one agent with assembled context and validate its output.
    /// Shared by the pipeline phases, specialists, and swarm tasks.
    pub(crate) async fn invoke_agent(
        &self,
        spec: &AgentSpec,
        ref_id: &str,
        request: &str,
        prior: &[(String, Value)],
        specialty: Option<Specialty>,
        retriever: Option<&dyn Retriever>,
        structure_summary: Option<&str>,
    ) -> EngineResult<(Option<Value>, ValidationResult)> {
        let mut state = PhaseState::Idle;
        tracing::debug!(agent = spec.id, ?state, "invoking agent");
        state = PhaseState::BuildingContext;
        tracing::debug!(agent = spec.id, ?state, "building context");
        let system = self.context.system_prompt(spec);
        let user = self
            .context
            .build_user(request, prior, retriever, structure_summary)
            .await;

        let phase = spec_phase(spec);
        let model = match phase {
            Some(phase) => self.config.router.route(phase, specialty, None),
            None => self.config.router.route_agent(
                crate::models::AgentKind::Custom,
                specialty,
                None,
            ),
        };
        self.sink.append(TraceEvent::route(ref_id, &model.model));
        self.sink.append(TraceEvent::prompt(ref_id, &user));

        state = PhaseState::AwaitingModel;
        tracing::debug!(agent = spec.id, ?state, model = %model.model, "awaiting model");
        let completion = CompletionRequest {
            agent_id: spec.id.to_string(),
            system,
            user,
            model,
        };
        let raw = self
            .client
            .complete(&completion)
            .await
            .map_err(|e| EngineError::ModelCall(e.to_string()))?;
        self.sink.append(TraceEvent::response(ref_id, &raw));

        state = PhaseState::Validating;
        tracing::debug!(agent = spec.id, ?state, "validating output");
        let Some(payload) = extract_payload(&raw) else {
            let validation =
                ValidationResult::invalid(vec!["no JSON object found in response".to_string()]);
            self.sink.append(TraceEvent::validation(
                ref_id,
                spec.schema_name,
                false,
                &validation.errors,
            ));
            return Ok((None, validation));
        };

        let validation = self.validator.validate(&payload, spec.schema_name);
        self.sink.append(TraceEvent::validation(
            ref_id,
            spec.schema_name,
            validation.valid,
            &validation.errors,
        ));
        Ok((Some(payload), validation))
    }

    /// Run a single phase once: context, model call, extraction,
    /// validation. Validation failures come back in the report; the caller
    /// decides whether to re-prompt or abort.
    pub async fn run_phase(
        &self,
        phase: Phase,
        request: &str,
        prior: &[(String, Value)],
        retriever: Option<&dyn Retriever>,
        structure_summary: Option<&str>,
    ) -> EngineResult<PhaseReport> {
        let spec = agents::phase_spec(phase);
        let (payload, validation) = self
            .invoke_agent(
                spec,
                phase.as_str(),
                request,
                prior,
                None,
                retriever,
                structure_summary,
            )
            .await?;

        let answer = payload.as_ref().and_then(qa_answer);
        let state = PhaseReport::terminal_state(&validation, &answer);
        Ok(PhaseReport {
            phase,
            payload,
            validation,
            answer,
            state,
        })
    }

    /// Run one specialist against the plan so far
    pub async fn run_specialist(
        &self,
        specialty: Specialty,
        request: &str,
        prior: &[(String, Value)],
    ) -> EngineResult<PhaseReport> {
        let spec = agents::specialty_spec(specialty);
        let (payload, validation) = self
            .invoke_agent(
                spec,
                specialty.as_str(),
                request,
                prior,
                Some(specialty),
                None,
                None,
            )
            .await?;
        let state = PhaseReport::terminal_state(&validation, &None);
        Ok(PhaseReport {
            phase: Phase::Architect,
            payload,
            validation,
            answer: None,
            state,
        })
    }

    /// Run the full linear pipeline
    ///
    /// Empty requests fail fast before any agent is invoked. A phase whose
    /// output fails validation is re-prompted with the errors appended, up
    /// to the configured bound; exhausting the bound fails the run with a
    /// structured validation error.
    pub async fn run_pipeline(
        &self,
        request: &str,
        retriever: Option<&dyn Retriever>,
        structure_summary: Option<&str>,
    ) -> EngineResult<PipelineResult> {
        if request.trim().is_empty() {
            return Err(EngineError::EmptyRequest);
        }

        self.sink
            .append(TraceEvent::new(TraceKind::RunStarted, "pipeline"));

        let mut plan = Plan::default();
        for phase in Phase::all() {
            let mut attempt = 0;
            let mut prompt = request.to_string();
            let report = loop {
                let prior = plan.labeled();
                // Structure context only feeds the analyst; downstream
                // phases work from artifacts
                let structure = if phase == Phase::Analyst {
                    structure_summary
                } else {
                    None
                };
                let report = self
                    .run_phase(phase, &prompt, &prior, retriever, structure)
                    .await?;

                if report.validation.valid {
                    break report;
                }
                if attempt >= self.config.max_validation_retries {
                    self.sink.append(TraceEvent::error(
                        phase.as_str(),
                        "validation retries exhausted",
                    ));
                    self.sink
                        .append(TraceEvent::new(TraceKind::RunCompleted, "pipeline"));
                    return Err(EngineError::Validation {
                        schema: agents::phase_spec(phase).schema_name.to_string(),
                        errors: report.validation.errors,
                    });
                }
                attempt += 1;
                prompt = format!(
                    "{}\n\nYour previous output failed validation; fix all of these and respond again:\n- {}",
                    request,
                    report.validation.errors.join("\n- ")
                );
            };

            if let Some(answer) = report.answer {
                // Q&A bypass: terminal, no downstream phases
                if let Some(payload) = report.payload {
                    plan.append(phase, payload);
                }
                self.sink
                    .append(TraceEvent::new(TraceKind::RunCompleted, "pipeline"));
                return Ok(PipelineResult::Answer { answer, plan });
            }

            // A valid report always carries the extracted payload
            if let Some(payload) = report.payload {
                plan.append(phase, payload);
            }
        }

        self.sink
            .append(TraceEvent::new(TraceKind::RunCompleted, "pipeline"));
        Ok(PipelineResult::Completed { plan })
    }
}

fn spec_phase(spec: &AgentSpec) -> Option<Phase> {
    Phase::all().into_iter().find(|p| p.as_str() == spec.id)
}

/// Q&A bypass check
///
/// An explicit `"mode": "qa"` wins; payloads without a `mode` keep the
/// legacy behavior of bypassing when an `answer` field is present. A
/// payload declaring `"mode": "build"` never bypasses, answer or not.
fn qa_answer(payload: &Value) -> Option<String> {
    match payload.get("mode").and_then(Value::as_str) {
        Some("qa") => payload
            .get("answer")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(_) => None,
        None => payload
            .get("answer")
            .and_then(Value::as_str)
            .filter(|a| !a.trim().is_empty())
            .map(str::to_string),
    }
}
