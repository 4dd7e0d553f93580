//! # Swarm Tasks
//!
//! Task records and the validated task graph for one swarm run. Statuses
//! cross the API boundary as lowercase string tags only; the graph is
//! checked for duplicate ids, dangling dependencies, and cycles before a
//! single task is dispatched.

use crate::error::{EngineError, EngineResult};
use crate::models::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Status of one task
///
/// Advances forward only: pending → ready → running → {completed, failed};
/// skipped is reachable only from pending/ready when an ancestor fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    /// Whether a transition to `next` is legal
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Running)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Running, Completed)
                | (Running, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work in the swarm graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_kind: AgentKind,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub status: TaskStatus,
    /// Request fragment this task owns
    pub input: String,
    /// Validated artifact once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error detail once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: &str, agent_kind: AgentKind, input: &str) -> Self {
        Self {
            id: id.to_string(),
            agent_kind,
            dependencies: BTreeSet::new(),
            status: TaskStatus::Pending,
            input: input.to_string(),
            result: None,
            error: None,
        }
    }

    pub fn with_dependencies<I: IntoIterator<Item = String>>(mut self, deps: I) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }
}

/// One record in the decomposer's output
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_kind: AgentKind,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub input: String,
}

#[derive(Debug, Deserialize)]
struct Decomposition {
    tasks: Vec<TaskRecord>,
}

/// The full decomposition for one swarm run
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Originating request text
    pub request: String,
    /// Task id → task
    pub tasks: BTreeMap<String, Task>,
}

impl TaskGraph {
    /// Build and validate a graph from the decomposer's payload
    ///
    /// Fails with [`EngineError::Decomposition`] on duplicate ids, unknown
    /// dependency references, self-dependencies, or cycles. Nothing is
    /// dispatched from an invalid graph.
    pub fn from_decomposition(request: &str, payload: &serde_json::Value) -> EngineResult<Self> {
        let decomposition: Decomposition = serde_json::from_value(payload.clone())
            .map_err(|e| EngineError::Decomposition(format!("malformed task list: {}", e)))?;

        if decomposition.tasks.is_empty() {
            return Err(EngineError::Decomposition("no tasks produced".into()));
        }

        let mut tasks = BTreeMap::new();
        for record in &decomposition.tasks {
            if record.id.trim().is_empty() {
                return Err(EngineError::Decomposition("task with empty id".into()));
            }
            let task = Task::new(&record.id, record.agent_kind, &record.input)
                .with_dependencies(record.depends_on.iter().cloned());
            if tasks.insert(record.id.clone(), task).is_some() {
                return Err(EngineError::Decomposition(format!(
                    "duplicate task id '{}'",
                    record.id
                )));
            }
        }

        for task in tasks.values() {
            for dep in &task.dependencies {
                if dep == &task.id {
                    return Err(EngineError::Decomposition(format!(
                        "task '{}' depends on itself",
                        task.id
                    )));
                }
                if !tasks.contains_key(dep) {
                    return Err(EngineError::Decomposition(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep
                    )));
                }
            }
        }

        let graph = Self {
            request: request.to_string(),
            tasks,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm; any node left undrained sits on a cycle
    fn check_acyclic(&self) -> EngineResult<()> {
        let mut indegree: BTreeMap<&str, usize> = self
            .tasks
            .values()
            .map(|t| (t.id.as_str(), t.dependencies.len()))
            .collect();
        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut drained = 0;
        while let Some(id) = queue.pop_front() {
            drained += 1;
            for task in self.tasks.values() {
                if task.dependencies.contains(id) {
                    let d = indegree.get_mut(task.id.as_str()).expect("known task");
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(task.id.as_str());
                    }
                }
            }
        }

        if drained == self.tasks.len() {
            Ok(())
        } else {
            let cyclic: Vec<String> = indegree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            Err(EngineError::Decomposition(format!(
                "dependency cycle involving: {}",
                cyclic.join(", ")
            )))
        }
    }

    /// Task ids in dependency order, ties broken by id
    pub fn topological_order(&self) -> Vec<String> {
        let mut indegree: BTreeMap<String, usize> = self
            .tasks
            .values()
            .map(|t| (t.id.clone(), t.dependencies.len()))
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while order.len() < self.tasks.len() {
            // BTreeMap iteration gives the id tie-break for free
            let Some(next) = indegree
                .iter()
                .find(|(id, d)| **d == 0 && !order.contains(*id))
                .map(|(id, _)| id.clone())
            else {
                break; // cycle; validated graphs never get here
            };
            indegree.insert(next.clone(), usize::MAX);
            for task in self.tasks.values() {
                if task.dependencies.contains(&next) {
                    if let Some(d) = indegree.get_mut(&task.id) {
                        if *d != usize::MAX {
                            *d -= 1;
                        }
                    }
                }
            }
            order.push(next);
        }
        order
    }

    /// All tasks that transitively depend on `root`
    pub fn transitive_dependents(&self, root: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut frontier = vec![root.to_string()];
        while let Some(current) = frontier.pop() {
            for task in self.tasks.values() {
                if task.dependencies.contains(&current) && out.insert(task.id.clone()) {
                    frontier.push(task.id.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain_payload() -> serde_json::Value {
        json!({
            "tasks": [
                {"id": "task1", "agent_kind": "analyst", "input": "a"},
                {"id": "task2", "agent_kind": "architect", "input": "b", "depends_on": ["task1"]},
                {"id": "task3", "agent_kind": "implementation", "input": "c", "depends_on": ["task2"]}
            ]
        })
    }

    #[test]
    fn test_status_serializes_as_string_tag() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
        let back: TaskStatus = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(back, TaskStatus::Skipped);
    }

    #[test]
    fn test_status_forward_only() {
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_advance_to(TaskStatus::Failed));
        assert!(TaskStatus::Ready.can_advance_to(TaskStatus::Skipped));
        // No going back, no skipping from running
        assert!(!TaskStatus::Completed.can_advance_to(TaskStatus::Running));
        assert!(!TaskStatus::Running.can_advance_to(TaskStatus::Skipped));
        assert!(!TaskStatus::Failed.can_advance_to(TaskStatus::Pending));
    }

    #[test]
    fn test_valid_chain_parses() {
        let graph = TaskGraph::from_decomposition("req", &chain_payload()).unwrap();
        assert_eq!(graph.tasks.len(), 3);
        assert_eq!(
            graph.topological_order(),
            vec!["task1", "task2", "task3"]
        );
    }

    #[test]
    fn test_cycle_is_fatal() {
        let payload = json!({
            "tasks": [
                {"id": "task_a", "agent_kind": "analyst", "input": "a", "depends_on": ["task_b"]},
                {"id": "task_b", "agent_kind": "architect", "input": "b", "depends_on": ["task_a"]}
            ]
        });
        let err = TaskGraph::from_decomposition("req", &payload).unwrap_err();
        assert_eq!(err.kind(), "decomposition");
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_unknown_dependency_is_fatal() {
        let payload = json!({
            "tasks": [
                {"id": "task1", "agent_kind": "analyst", "input": "a", "depends_on": ["ghost"]}
            ]
        });
        let err = TaskGraph::from_decomposition("req", &payload).unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let payload = json!({
            "tasks": [
                {"id": "task1", "agent_kind": "analyst", "input": "a"},
                {"id": "task1", "agent_kind": "testing", "input": "b"}
            ]
        });
        let err = TaskGraph::from_decomposition("req", &payload).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_self_dependency_is_fatal() {
        let payload = json!({
            "tasks": [
                {"id": "task1", "agent_kind": "analyst", "input": "a", "depends_on": ["task1"]}
            ]
        });
        assert!(TaskGraph::from_decomposition("req", &payload).is_err());
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = TaskGraph::from_decomposition("req", &chain_payload()).unwrap();
        let dependents = graph.transitive_dependents("task1");
        assert!(dependents.contains("task2"));
        assert!(dependents.contains("task3"));
        assert!(!dependents.contains("task1"));
    }

    #[test]
    fn test_diamond_topological_order_is_deterministic() {
        let payload = json!({
            "tasks": [
                {"id": "root", "agent_kind": "analyst", "input": "r"},
                {"id": "left", "agent_kind": "architect", "input": "l", "depends_on": ["root"]},
                {"id": "right", "agent_kind": "architect", "input": "r", "depends_on": ["root"]},
                {"id": "join", "agent_kind": "testing", "input": "j", "depends_on": ["left", "right"]}
            ]
        });
        let graph = TaskGraph::from_decomposition("req", &payload).unwrap();
        assert_eq!(
            graph.topological_order(),
            vec!["root", "left", "right", "join"]
        );
    }
}
