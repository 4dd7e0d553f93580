//! # Swarm Manager
//!
//! Owns one swarm run end to end: decomposition, concurrent scheduling,
//! failure propagation, and synthesis. Scheduling is a claim/join loop over
//! the [`Blackboard`]: every iteration claims all runnable tasks, spawns
//! them, then waits for one to finish before claiming again. When nothing
//! is claimable, nothing is running, and tasks remain unfinished, the run
//! fails with a deadlock error instead of hanging.

use crate::agents;
use crate::context::Retriever;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::Orchestrator;
use crate::swarm::blackboard::{Blackboard, Observation};
use crate::swarm::task::{Task, TaskGraph, TaskStatus};
use crate::trace::{TraceEvent, TraceKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Final state of one swarm run
#[derive(Debug, Clone)]
pub struct SwarmResult {
    /// Human-readable synthesis of completed outputs in dependency order
    pub synthesis: String,
    /// Terminal state of every task
    pub tasks: BTreeMap<String, Task>,
    /// Observation log in append order
    pub observations: Vec<Observation>,
}

impl SwarmResult {
    pub fn completed_count(&self) -> usize {
        self.count_of(TaskStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count_of(TaskStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count_of(TaskStatus::Skipped)
    }

    fn count_of(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }
}

/// Drives decomposition and graph execution for swarm runs
pub struct SwarmManager {
    orchestrator: Arc<Orchestrator>,
}

impl SwarmManager {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Execute one request as a swarm: decompose, run the graph, synthesize
    ///
    /// Task-local failures are contained (dependents become `skipped`, the
    /// run still synthesizes); only an empty request, an unusable
    /// decomposition, or a wedged graph fails the run itself.
    pub async fn run(
        &self,
        request: &str,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> EngineResult<SwarmResult> {
        if request.trim().is_empty() {
            return Err(EngineError::EmptyRequest);
        }
        let sink = self.orchestrator.sink();
        sink.append(TraceEvent::new(TraceKind::RunStarted, "swarm"));

        let result = async {
            let graph = self.decompose(request, retriever.as_deref()).await?;
            self.execute_graph(graph, retriever).await
        }
        .await;

        if let Err(e) = &result {
            sink.append(TraceEvent::error("swarm", &e.to_string()));
        }
        sink.append(TraceEvent::new(TraceKind::RunCompleted, "swarm"));
        result
    }

    /// Ask the decomposer for a task graph and validate it structurally
    ///
    /// Schema failures get the bounded re-prompt treatment; graph-level
    /// failures (cycles, unknown references) are rejected outright since a
    /// model that produced a cycle once is not re-prompted with evidence it
    /// can act on.
    pub async fn decompose(
        &self,
        request: &str,
        retriever: Option<&dyn Retriever>,
    ) -> EngineResult<TaskGraph> {
        let spec = agents::decomposer_spec();
        let mut prompt = request.to_string();
        let mut attempt = 0;
        loop {
            let (payload, validation) = self
                .orchestrator
                .invoke_agent(spec, spec.id, &prompt, &[], None, retriever, None)
                .await?;

            if validation.valid {
                if let Some(payload) = payload {
                    return TaskGraph::from_decomposition(request, &payload);
                }
            }
            if attempt >= self.orchestrator.config().max_validation_retries {
                return Err(EngineError::Decomposition(format!(
                    "decomposer output failed validation: {}",
                    validation.errors.join("; ")
                )));
            }
            attempt += 1;
            prompt = format!(
                "{}\n\nYour previous decomposition failed validation; fix all of these and respond again:\n- {}",
                request,
                validation.errors.join("\n- ")
            );
        }
    }

    /// Run a validated graph to a terminal state on every task
    pub async fn execute_graph(
        &self,
        graph: TaskGraph,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> EngineResult<SwarmResult> {
        let graph = Arc::new(graph);
        let blackboard = Arc::new(Blackboard::new(&graph));
        let sink = self.orchestrator.sink();
        let mut running: JoinSet<(String, Result<Value, String>)> = JoinSet::new();

        loop {
            for task in blackboard.claim_ready().await {
                sink.append(TraceEvent::task_status(
                    &task.id,
                    TaskStatus::Running.as_str(),
                ));
                let orchestrator = self.orchestrator.clone();
                let blackboard = blackboard.clone();
                let retriever = retriever.clone();
                running.spawn(async move {
                    let outcome =
                        run_task(&orchestrator, &blackboard, &task, retriever.as_deref()).await;
                    (task.id, outcome)
                });
            }

            if running.is_empty() {
                if blackboard.all_terminal().await {
                    break;
                }
                // Nothing claimable and nothing in flight: the graph is
                // wedged. Validated graphs only get here through dangling
                // dependencies.
                let stuck = blackboard.pending_ids().await;
                return Err(EngineError::Deadlock { stuck });
            }

            let joined = match running.join_next().await {
                Some(Ok(joined)) => joined,
                Some(Err(e)) => {
                    return Err(EngineError::Other(anyhow::anyhow!(
                        "swarm worker aborted: {}",
                        e
                    )))
                }
                None => continue,
            };

            match joined {
                (task_id, Ok(result)) => {
                    self.record(&blackboard, &task_id, TaskStatus::Completed, Some(result), None)
                        .await;
                    blackboard
                        .append_observation(Some(&task_id), "task completed")
                        .await;
                    sink.append(TraceEvent::task_status(
                        &task_id,
                        TaskStatus::Completed.as_str(),
                    ));
                }
                (task_id, Err(reason)) => {
                    self.record(
                        &blackboard,
                        &task_id,
                        TaskStatus::Failed,
                        None,
                        Some(reason.clone()),
                    )
                    .await;
                    blackboard
                        .append_observation(Some(&task_id), &format!("task failed: {}", reason))
                        .await;
                    sink.append(TraceEvent::error(&task_id, &reason));
                    sink.append(TraceEvent::task_status(
                        &task_id,
                        TaskStatus::Failed.as_str(),
                    ));

                    // Everything downstream of the failure can no longer
                    // run; mark it skipped rather than leaving it pending
                    for dependent in graph.transitive_dependents(&task_id) {
                        let reason = format!("dependency '{}' failed", task_id);
                        if blackboard.skip(&dependent, &reason).await {
                            sink.append(TraceEvent::task_status(
                                &dependent,
                                TaskStatus::Skipped.as_str(),
                            ));
                        }
                    }
                }
            }
        }

        let tasks = blackboard.snapshot_all().await;
        let synthesis = synthesize(&graph, &tasks);
        Ok(SwarmResult {
            synthesis,
            tasks,
            observations: blackboard.observations().await,
        })
    }

    async fn record(
        &self,
        blackboard: &Blackboard,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) {
        if let Err(e) = blackboard.put(task_id, status, result, error).await {
            tracing::warn!(task_id, "dropping illegal task transition: {}", e);
        }
    }
}

/// Execute one claimed task against its agent, with the bounded validation
/// re-prompt. Returns the validated payload, or the failure reason.
async fn run_task(
    orchestrator: &Orchestrator,
    blackboard: &Blackboard,
    task: &Task,
    retriever: Option<&dyn Retriever>,
) -> Result<Value, String> {
    let spec = agents::task_spec(task.agent_kind);

    // Completed dependency outputs become upstream artifacts in the
    // task's context, labeled by task id
    let mut prior = Vec::with_capacity(task.dependencies.len());
    for dep in &task.dependencies {
        if let Some(dep_task) = blackboard.get(dep).await {
            if let Some(result) = dep_task.result {
                prior.push((dep.clone(), result));
            }
        }
    }

    let max_retries = orchestrator.config().max_validation_retries;
    let mut prompt = task.input.clone();
    let mut attempt = 0;
    loop {
        let (payload, validation) = orchestrator
            .invoke_agent(spec, &task.id, &prompt, &prior, None, retriever, None)
            .await
            .map_err(|e| e.to_string())?;

        if validation.valid {
            if let Some(payload) = payload {
                return Ok(payload);
            }
        }
        if attempt >= max_retries {
            return Err(format!(
                "output failed validation: {}",
                validation.errors.join("; ")
            ));
        }
        attempt += 1;
        prompt = format!(
            "{}\n\nYour previous output failed validation; fix all of these and respond again:\n- {}",
            task.input,
            validation.errors.join("\n- ")
        );
    }
}

/// Render the run outcome in dependency order, ties broken by task id
fn synthesize(graph: &TaskGraph, tasks: &BTreeMap<String, Task>) -> String {
    let mut out = format!("# Swarm result\n\nRequest: {}\n", graph.request);
    for id in graph.topological_order() {
        let Some(task) = tasks.get(&id) else { continue };
        out.push_str(&format!("\n## {} ({})\n\n", id, task.agent_kind));
        match task.status {
            TaskStatus::Completed => match &task.result {
                Some(result) => {
                    // Lead with the artifact summary when it has one
                    if let Some(summary) = result.get("summary").and_then(Value::as_str) {
                        out.push_str(summary);
                        out.push('\n');
                    }
                    let rendered = serde_json::to_string_pretty(result)
                        .unwrap_or_else(|_| "<unrenderable artifact>".to_string());
                    out.push_str(&format!("\n```json\n{}\n```\n", rendered));
                }
                None => out.push_str("Completed with no artifact.\n"),
            },
            TaskStatus::Failed => {
                let reason = task.error.as_deref().unwrap_or("unknown failure");
                out.push_str(&format!("Failed: {}\n", reason));
            }
            TaskStatus::Skipped => {
                let reason = task.error.as_deref().unwrap_or("ancestor failed");
                out.push_str(&format!("Skipped: {}\n", reason));
            }
            other => out.push_str(&format!("Unfinished ({}).\n", other)),
        }
    }
    out
}
