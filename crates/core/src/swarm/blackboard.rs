//! # Blackboard
//!
//! The shared state store for one swarm run: task snapshots plus an
//! ordered free-form observations log. All access goes through one async
//! mutex, and `put` swaps whole task records, so concurrent readers see
//! either the pre- or post-update snapshot, never a partial write.
//!
//! Owned by the `SwarmManager` for the duration of a single
//! `execute_swarm` call and discarded with it.

use crate::swarm::task::{Task, TaskGraph, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// One entry in the observations log
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub ts: DateTime<Utc>,
    /// Task that wrote the observation, if any
    pub task_id: Option<String>,
    pub text: String,
}

#[derive(Default)]
struct BlackboardState {
    tasks: BTreeMap<String, Task>,
    observations: Vec<Observation>,
}

/// Run-scoped shared store
pub struct Blackboard {
    state: Mutex<BlackboardState>,
}

impl Blackboard {
    /// Seed the board with the validated graph's tasks
    pub fn new(graph: &TaskGraph) -> Self {
        Self {
            state: Mutex::new(BlackboardState {
                tasks: graph.tasks.clone(),
                observations: Vec::new(),
            }),
        }
    }

    /// Snapshot of one task
    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.state.lock().await.tasks.get(task_id).cloned()
    }

    /// Replace a task's status and outcome atomically
    ///
    /// Rejects transitions that would move a status backwards; this is
    /// what makes double-completion or resurrecting a failed task
    /// impossible.
    pub async fn put(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow::anyhow!("unknown task '{}'", task_id))?;
        if !task.status.can_advance_to(status) {
            anyhow::bail!(
                "illegal transition for '{}': {} -> {}",
                task_id,
                task.status,
                status
            );
        }
        // Whole-record swap: build the new snapshot, then assign
        let mut updated = task.clone();
        updated.status = status;
        updated.result = result;
        updated.error = error;
        *task = updated;
        Ok(())
    }

    /// Atomically select every pending task whose dependencies are all
    /// completed and transition it to running
    ///
    /// Selection and transition happen under one lock acquisition, which
    /// upholds the at-most-one-execution invariant against concurrent
    /// completions.
    pub async fn claim_ready(&self) -> Vec<Task> {
        let mut state = self.state.lock().await;
        let ready_ids: Vec<String> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| {
                t.dependencies.iter().all(|dep| {
                    state
                        .tasks
                        .get(dep)
                        .map(|d| d.status == TaskStatus::Completed)
                        .unwrap_or(false)
                })
            })
            .map(|t| t.id.clone())
            .collect();

        let mut claimed = Vec::with_capacity(ready_ids.len());
        for id in ready_ids {
            if let Some(task) = state.tasks.get_mut(&id) {
                task.status = TaskStatus::Running;
                claimed.push(task.clone());
            }
        }
        claimed
    }

    /// Mark a not-yet-started task skipped (ancestor failed)
    ///
    /// Returns false when the task had already started or finished, in
    /// which case it is left untouched.
    pub async fn skip(&self, task_id: &str, reason: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(task_id) {
            Some(task) if task.status.can_advance_to(TaskStatus::Skipped) => {
                let mut updated = task.clone();
                updated.status = TaskStatus::Skipped;
                updated.error = Some(reason.to_string());
                *task = updated;
                true
            }
            _ => false,
        }
    }

    /// Append one observation to the ordered log
    pub async fn append_observation(&self, task_id: Option<&str>, text: &str) {
        let mut state = self.state.lock().await;
        state.observations.push(Observation {
            ts: Utc::now(),
            task_id: task_id.map(str::to_string),
            text: text.to_string(),
        });
    }

    /// Consistent snapshot of every task
    pub async fn snapshot_all(&self) -> BTreeMap<String, Task> {
        self.state.lock().await.tasks.clone()
    }

    /// The observations log, in append order
    pub async fn observations(&self) -> Vec<Observation> {
        self.state.lock().await.observations.clone()
    }

    /// True when every task is in a terminal status
    pub async fn all_terminal(&self) -> bool {
        self.state
            .lock()
            .await
            .tasks
            .values()
            .all(|t| t.status.is_terminal())
    }

    /// Ids of tasks still pending
    pub async fn pending_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Number of tasks currently running
    pub async fn running_count(&self) -> usize {
        self.state
            .lock()
            .await
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn board() -> Blackboard {
        let payload = json!({
            "tasks": [
                {"id": "task1", "agent_kind": "analyst", "input": "a"},
                {"id": "task2", "agent_kind": "architect", "input": "b", "depends_on": ["task1"]}
            ]
        });
        let graph = TaskGraph::from_decomposition("req", &payload).unwrap();
        Blackboard::new(&graph)
    }

    #[tokio::test]
    async fn test_claim_ready_only_with_completed_deps() {
        let board = board();

        // Only task1 has no dependencies
        let claimed = board.claim_ready().await;
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, "task1");
        assert_eq!(claimed[0].status, TaskStatus::Running);

        // task2 not ready until task1 completes
        assert!(board.claim_ready().await.is_empty());
        board
            .put("task1", TaskStatus::Completed, Some(json!({"ok": true})), None)
            .await
            .unwrap();
        let claimed = board.claim_ready().await;
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, "task2");
    }

    #[tokio::test]
    async fn test_claim_is_at_most_once() {
        let board = board();
        assert_eq!(board.claim_ready().await.len(), 1);
        // Reclaiming returns nothing; task1 already running
        assert!(board.claim_ready().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_backwards_transition() {
        let board = board();
        board.claim_ready().await;
        board
            .put("task1", TaskStatus::Completed, None, None)
            .await
            .unwrap();
        assert!(board
            .put("task1", TaskStatus::Running, None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_skip_only_before_start() {
        let board = board();
        assert!(board.skip("task2", "ancestor failed").await);
        let task = board.get("task2").await.unwrap();
        assert_eq!(task.status, TaskStatus::Skipped);
        assert_eq!(task.error.as_deref(), Some("ancestor failed"));

        board.claim_ready().await; // task1 now running
        assert!(!board.skip("task1", "too late").await);
    }

    #[tokio::test]
    async fn test_observations_keep_append_order() {
        let board = board();
        board.append_observation(Some("task1"), "first").await;
        board.append_observation(None, "second").await;
        let obs = board.observations().await;
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].text, "first");
        assert_eq!(obs[1].task_id, None);
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_corrupt_a_record() {
        let board = std::sync::Arc::new(board());
        let mut handles = Vec::new();
        for i in 0..16 {
            let board = board.clone();
            handles.push(tokio::spawn(async move {
                board
                    .append_observation(Some("task1"), &format!("obs-{}", i))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(board.observations().await.len(), 16);
        // Task records unaffected by observation traffic
        assert_eq!(
            board.get("task1").await.unwrap().status,
            TaskStatus::Pending
        );
    }
}
