use serde::{Deserialize, Serialize};

use crate::TaskId;

/// Aggregated state of a task across all of its scheduled units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// No unit active yet, none failed, not all succeeded.
    Pending,
    /// At least one unit is actively running.
    Running,
    /// Every unit succeeded.
    Completed,
    /// At least one unit failed. Sticky: a single failed node poisons the
    /// whole distributed job even while others are still running.
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

/// Per-node diagnostics attached to a [`TaskStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNodes {
    pub num_nodes: u32,
    /// Names of the underlying unit objects, one per node.
    pub unit_names: Vec<String>,
    pub succeeded: u32,
    pub failed: u32,
    pub running: u32,
    pub pending: u32,
}

/// Point-in-time view of a task, recomputed from cluster state on every
/// query. Never persisted; `updated_at` is the aggregation instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state: TaskState,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub nodes: TaskNodes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&TaskState::Completed).unwrap(), r#""completed""#);
        let back: TaskState = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(back, TaskState::Failed);
    }
}
