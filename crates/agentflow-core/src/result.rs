use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Final status of a task in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    /// Never started because a dependency can no longer complete.
    Blocked,
    /// Finished, but the executor asked for a human decision.
    NeedsHumanReview,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::NeedsHumanReview => write!(f, "needs_human_review"),
        }
    }
}

/// Outcome of executing one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    /// Values this task publishes to downstream tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
            agent_type: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn completed(output: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut result = Self::new(TaskStatus::Completed);
        result.output = Some(output);
        result
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        let mut result = Self::new(TaskStatus::Failed);
        result.error = Some(reason.into());
        result
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        let mut result = Self::new(TaskStatus::Blocked);
        result.error = Some(reason.into());
        result
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    /// Wall-clock duration, when both timestamps were recorded.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Results of one plan run keyed by `task_id`.
pub type ResultsMap = HashMap<String, TaskResult>;
