//! Run state tracking
//!
//! Per-node states, the transition events a run emits, and the final
//! [`RunResult`] handed back to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::CoreResult;
use crate::task_name::TaskName;

/// State of one task within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting for predecessors
    Pending,
    /// An attempt is in flight
    Running,
    Succeeded,
    /// Final attempt failed
    Failed,
    /// Never executed because a predecessor did not succeed
    UpstreamFailed,
    /// Never executed because the run was cancelled
    Skipped,
}

impl NodeState {
    /// Succeeded, Failed, UpstreamFailed or Skipped
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Pending | NodeState::Running)
    }

    /// Whether a successor of a node in this state may still run
    pub fn blocks_successors(self) -> bool {
        matches!(
            self,
            NodeState::Failed | NodeState::UpstreamFailed | NodeState::Skipped
        )
    }

    /// Legal state machine edges
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Pending, NodeState::Running)
                | (NodeState::Pending, NodeState::UpstreamFailed)
                | (NodeState::Pending, NodeState::Skipped)
                | (NodeState::Running, NodeState::Succeeded)
                | (NodeState::Running, NodeState::Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Running => write!(f, "running"),
            NodeState::Succeeded => write!(f, "succeeded"),
            NodeState::Failed => write!(f, "failed"),
            NodeState::UpstreamFailed => write!(f, "upstream_failed"),
            NodeState::Skipped => write!(f, "skipped"),
        }
    }
}

/// One node state change, emitted as the run progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: String,
    pub task: TaskName,
    pub from: NodeState,
    pub to: NodeState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A task that did not succeed, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub task: TaskName,
    pub state: NodeState,
    pub error: String,
    /// Attempts made; zero for tasks that never executed
    pub attempts: u32,
}

/// Final result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Final state of every task
    pub nodes: BTreeMap<TaskName, NodeState>,
    /// Every task that ended Failed, UpstreamFailed or Skipped
    pub failures: Vec<NodeFailure>,
    pub cancelled: bool,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn state_of(&self, task: &str) -> Option<NodeState> {
        self.nodes.get(task).copied()
    }

    /// Tasks that failed on their own
    pub fn failed(&self) -> Vec<&TaskName> {
        self.tasks_in(NodeState::Failed)
    }

    /// Tasks skipped because something upstream failed
    pub fn upstream_failed(&self) -> Vec<&TaskName> {
        self.tasks_in(NodeState::UpstreamFailed)
    }

    /// Tasks skipped by cancellation
    pub fn skipped(&self) -> Vec<&TaskName> {
        self.tasks_in(NodeState::Skipped)
    }

    pub fn failure_for(&self, task: &str) -> Option<&NodeFailure> {
        self.failures.iter().find(|f| f.task == task)
    }

    fn tasks_in(&self, state: NodeState) -> Vec<&TaskName> {
        self.nodes
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let count = |state| self.nodes.values().filter(|s| **s == state).count();
        RunSummary {
            total: self.nodes.len(),
            succeeded: count(NodeState::Succeeded),
            failed: count(NodeState::Failed),
            upstream_failed: count(NodeState::UpstreamFailed),
            skipped: count(NodeState::Skipped),
            duration_ms: (self.finished_at - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        }
    }

    /// Write the result as pretty JSON, via a temp file and rename
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Counts per final state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub upstream_failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
#[path = "run_state_test.rs"]
mod tests;
