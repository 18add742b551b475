use crate::task::AgentTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Scheduling algorithm governing task ordering and concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One task at a time, in dependency order.
    #[default]
    Sequential,
    /// Dependency-gated tasks, bounded by the concurrency cap.
    Parallel,
    /// Stage by stage, each stage fully concurrent.
    Pipeline,
    /// Everything at once over a shared collaboration channel.
    Collaborative,
    /// Switches between sequential and parallel based on live statistics.
    Adaptive,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
            ExecutionStrategy::Pipeline => write!(f, "pipeline"),
            ExecutionStrategy::Collaborative => write!(f, "collaborative"),
            ExecutionStrategy::Adaptive => write!(f, "adaptive"),
        }
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "parallel" => Ok(ExecutionStrategy::Parallel),
            "pipeline" => Ok(ExecutionStrategy::Pipeline),
            "collaborative" => Ok(ExecutionStrategy::Collaborative),
            "adaptive" => Ok(ExecutionStrategy::Adaptive),
            _ => Err(format!("unknown execution strategy '{s}'")),
        }
    }
}

/// A goal decomposed into a task graph plus a chosen execution strategy.
///
/// `tasks` carries no ordering meaning; the dependency graph does.
/// `dependencies_graph` is copied from each task's own `dependencies` when the
/// plan is built and is stored independently afterwards, so the two can
/// drift. Use [`WorkflowPlan::graph_divergence`] to find out whether they have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub plan_id: String,
    pub goal: String,
    pub strategy: ExecutionStrategy,
    pub tasks: Vec<AgentTask>,
    pub dependencies_graph: HashMap<String, Vec<String>>,
    /// Upstream estimate, in seconds.
    #[serde(default)]
    pub estimated_duration: f64,
    #[serde(default)]
    pub resource_requirements: HashMap<String, serde_json::Value>,
    /// Declarative criteria evaluated after execution.
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Defaults to the time of deserialization when absent.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowPlan {
    /// Create a plan whose dependency graph is copied from `tasks`.
    pub fn new(
        plan_id: impl Into<String>,
        goal: impl Into<String>,
        strategy: ExecutionStrategy,
        tasks: Vec<AgentTask>,
    ) -> Self {
        let dependencies_graph = tasks
            .iter()
            .map(|t| (t.task_id.clone(), t.dependencies.clone()))
            .collect();
        Self {
            plan_id: plan_id.into(),
            goal: goal.into(),
            strategy,
            tasks,
            dependencies_graph,
            estimated_duration: 0.0,
            resource_requirements: HashMap::new(),
            success_criteria: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_success_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.success_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&AgentTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// Task ids in list order.
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    /// Ids of tasks whose `dependencies_graph` entry no longer matches the
    /// task's own `dependencies` (a missing graph entry counts as a mismatch).
    pub fn graph_divergence(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| self.dependencies_graph.get(&t.task_id) != Some(&t.dependencies))
            .map(|t| t.task_id.clone())
            .collect()
    }
}
