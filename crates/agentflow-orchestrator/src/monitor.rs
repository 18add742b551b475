use agentflow_core::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whether any task of an agent type is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
}

/// Counters for one agent type (or, aggregated, for the whole engine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_started: u64,
    pub completed: u64,
    pub failed: u64,
    /// Finished with any status other than completed or failed.
    pub other: u64,
    pub duration_ms: u64,
}

/// Live view of one agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_type: String,
    pub running_tasks: Vec<String>,
    pub status: WorkerStatus,
    pub metrics: AgentMetrics,
}

impl AgentState {
    fn new(agent_type: &str) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            running_tasks: Vec::new(),
            status: WorkerStatus::Idle,
            metrics: AgentMetrics::default(),
        }
    }
}

#[derive(Default)]
struct MonitorState {
    agents: HashMap<String, AgentState>,
    running: usize,
    peak_running: usize,
}

/// Tracks task activity per agent type across every run of an engine.
#[derive(Clone, Default)]
pub struct ExecutionMonitor {
    state: Arc<RwLock<MonitorState>>,
}

impl ExecutionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a task as executing.
    pub async fn start_task(&self, agent_type: &str, task_id: &str) {
        let mut state = self.state.write().await;
        state.running += 1;
        state.peak_running = state.peak_running.max(state.running);

        let agent = state
            .agents
            .entry(agent_type.to_string())
            .or_insert_with(|| AgentState::new(agent_type));
        agent.running_tasks.push(task_id.to_string());
        agent.status = WorkerStatus::Working;
        agent.metrics.tasks_started += 1;
    }

    /// Mark a task as finished and record its outcome.
    pub async fn finish_task(
        &self,
        agent_type: &str,
        task_id: &str,
        status: TaskStatus,
        duration_ms: u64,
    ) {
        let mut state = self.state.write().await;
        state.running = state.running.saturating_sub(1);

        let Some(agent) = state.agents.get_mut(agent_type) else {
            return;
        };
        agent.running_tasks.retain(|id| id != task_id);
        if agent.running_tasks.is_empty() {
            agent.status = WorkerStatus::Idle;
        }
        match status {
            TaskStatus::Completed => agent.metrics.completed += 1,
            TaskStatus::Failed => agent.metrics.failed += 1,
            _ => agent.metrics.other += 1,
        }
        agent.metrics.duration_ms += duration_ms;
    }

    /// Tasks executing right now, across all agent types.
    pub async fn running(&self) -> usize {
        self.state.read().await.running
    }

    /// Highest number of tasks that were ever executing at once.
    pub async fn peak_running(&self) -> usize {
        self.state.read().await.peak_running
    }

    /// Get a snapshot of all agent states.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let state = self.state.read().await;
        let mut agents: Vec<AgentState> = state.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.agent_type.cmp(&b.agent_type));
        agents
    }

    pub async fn get_state(&self, agent_type: &str) -> Option<AgentState> {
        self.state.read().await.agents.get(agent_type).cloned()
    }

    /// Get aggregate metrics across all agent types.
    pub async fn aggregate_metrics(&self) -> AgentMetrics {
        let state = self.state.read().await;
        let mut total = AgentMetrics::default();
        for agent in state.agents.values() {
            total.tasks_started += agent.metrics.tasks_started;
            total.completed += agent.metrics.completed;
            total.failed += agent.metrics.failed;
            total.other += agent.metrics.other;
            total.duration_ms += agent.metrics.duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let agents = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        let peak = self.peak_running().await;
        serde_json::json!({
            "agents": agents,
            "aggregate": aggregate,
            "peak_running": peak,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_finish_task() {
        let monitor = ExecutionMonitor::new();
        assert!(monitor.snapshot().await.is_empty());

        monitor.start_task("coder", "t1").await;
        monitor.start_task("coder", "t2").await;
        let state = monitor.get_state("coder").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.running_tasks, vec!["t1", "t2"]);

        monitor
            .finish_task("coder", "t1", TaskStatus::Completed, 40)
            .await;
        let state = monitor.get_state("coder").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);

        monitor.finish_task("coder", "t2", TaskStatus::Failed, 10).await;
        let state = monitor.get_state("coder").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert_eq!(state.metrics.completed, 1);
        assert_eq!(state.metrics.failed, 1);
        assert_eq!(state.metrics.duration_ms, 50);
    }

    #[tokio::test]
    async fn test_peak_running() {
        let monitor = ExecutionMonitor::new();
        monitor.start_task("a", "1").await;
        monitor.start_task("b", "2").await;
        monitor.finish_task("a", "1", TaskStatus::Completed, 0).await;
        monitor.start_task("a", "3").await;
        assert_eq!(monitor.running().await, 2);
        assert_eq!(monitor.peak_running().await, 2);
    }

    #[tokio::test]
    async fn test_aggregate_and_json() {
        let monitor = ExecutionMonitor::new();
        monitor.start_task("classifier", "1").await;
        monitor
            .finish_task("classifier", "1", TaskStatus::NeedsHumanReview, 5)
            .await;
        monitor.start_task("general", "2").await;
        monitor
            .finish_task("general", "2", TaskStatus::Completed, 7)
            .await;

        let agg = monitor.aggregate_metrics().await;
        assert_eq!(agg.tasks_started, 2);
        assert_eq!(agg.completed, 1);
        assert_eq!(agg.other, 1);
        assert_eq!(agg.duration_ms, 12);

        let json = monitor.to_json().await;
        assert_eq!(json["agents"][0]["agent_type"], "classifier");
        assert_eq!(json["peak_running"], 1);
    }
}
