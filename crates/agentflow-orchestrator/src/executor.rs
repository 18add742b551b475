use crate::board::ResultBoard;
use agentflow_core::{AgentTask, AgentflowResult, ResultsMap, TaskResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// What a task sees when it is dispatched.
///
/// `results` is a snapshot taken at dispatch time; `board` is the live view
/// of the same run for executors that want to watch other tasks finish.
#[derive(Clone)]
pub struct TaskContext {
    pub plan_id: String,
    pub results: ResultsMap,
    /// Outputs accumulated by earlier pipeline stages. Empty outside the
    /// pipeline strategy.
    pub pipeline_context: Map<String, Value>,
    /// Set for tasks run by the collaborative strategy.
    pub collaboration_channel: Option<String>,
    pub board: Arc<ResultBoard>,
}

impl TaskContext {
    pub fn new(plan_id: impl Into<String>, board: Arc<ResultBoard>) -> Self {
        let results = board.snapshot();
        Self {
            plan_id: plan_id.into(),
            results,
            pipeline_context: Map::new(),
            collaboration_channel: None,
            board,
        }
    }

    pub fn with_pipeline_context(mut self, context: Map<String, Value>) -> Self {
        self.pipeline_context = context;
        self
    }

    pub fn with_collaboration_channel(mut self, channel: impl Into<String>) -> Self {
        self.collaboration_channel = Some(channel.into());
        self
    }

    /// Results keyed by task id, with pipeline outputs layered on top.
    ///
    /// A pipeline key equal to a task id shadows that task's result.
    pub fn merged_context(&self) -> Map<String, Value> {
        let mut merged: Map<String, Value> = self
            .results
            .iter()
            .map(|(id, result)| {
                let value = serde_json::to_value(result).unwrap_or(Value::Null);
                (id.clone(), value)
            })
            .collect();
        for (key, value) in &self.pipeline_context {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Runs a single task. Implemented by whatever actually does the work:
/// an agent runtime, a remote worker, a test double.
///
/// Executors report failure through the returned [`TaskResult`]; a panic is
/// caught by the worker pool and recorded as a failed result.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> TaskResult;
}

/// Background participant of a collaborative run.
///
/// Started before the run's tasks and cancelled once all of them have
/// finished; whatever it returns is ignored beyond logging.
#[async_trait]
pub trait CollaborationCoordinator: Send + Sync {
    async fn coordinate(&self, channel: &str) -> AgentflowResult<()>;
}

/// Coordinator that does nothing until it is cancelled.
pub struct IdleCoordinator;

#[async_trait]
impl CollaborationCoordinator for IdleCoordinator {
    async fn coordinate(&self, channel: &str) -> AgentflowResult<()> {
        debug!(channel = %channel, "Idle coordinator attached");
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Completes every task without doing any work.
///
/// Each task publishes `{task_id: {agent_type, action, inputs}}`, which is
/// enough to trace data flow through a plan from the command line.
pub struct DryRunExecutor;

#[async_trait]
impl TaskExecutor for DryRunExecutor {
    async fn execute(&self, task: &AgentTask, ctx: &TaskContext) -> TaskResult {
        debug!(
            plan_id = %ctx.plan_id,
            task_id = %task.task_id,
            agent_type = %task.agent_type,
            action = %task.action,
            "Dry-run task"
        );
        let mut output = Map::new();
        output.insert(
            task.task_id.clone(),
            json!({
                "agent_type": task.agent_type,
                "action": task.action,
                "inputs": task.inputs,
            }),
        );
        TaskResult::completed(output)
    }
}
