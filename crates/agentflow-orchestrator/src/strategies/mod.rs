//! One [`StrategyExecutor`] per [`ExecutionStrategy`].
//!
//! All strategies share the same building blocks: a [`RunContext`] holding
//! the run's [`ResultBoard`] and [`WorkerPool`], so the concurrency cap and
//! write-once results hold no matter which strategy drives the run.

mod adaptive;
mod collaborative;
mod parallel;
mod pipeline;
mod sequential;

pub use adaptive::{select_adaptive_strategy, AdaptiveStrategy};
pub use collaborative::CollaborativeStrategy;
pub use parallel::ParallelStrategy;
pub use pipeline::PipelineStrategy;
pub use sequential::SequentialStrategy;

use crate::board::{Readiness, ResultBoard};
use crate::config::EngineConfig;
use crate::executor::{CollaborationCoordinator, TaskContext};
use crate::pool::{TaskOutcome, WorkerPool};
use agentflow_core::{AgentTask, ExecutionStrategy, ResultsMap, TaskResult, WorkflowPlan};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, warn};

/// Everything a strategy needs for one run of one plan.
pub struct RunContext {
    pub config: EngineConfig,
    pub pool: WorkerPool,
    pub board: Arc<ResultBoard>,
    pub coordinator: Arc<dyn CollaborationCoordinator>,
}

impl RunContext {
    pub fn new(
        config: EngineConfig,
        pool: WorkerPool,
        coordinator: Arc<dyn CollaborationCoordinator>,
    ) -> Self {
        Self {
            config,
            pool,
            board: Arc::new(ResultBoard::new()),
            coordinator,
        }
    }

    /// Context for a task dispatched now.
    pub fn task_context(&self, plan: &WorkflowPlan) -> TaskContext {
        TaskContext::new(plan.plan_id.clone(), Arc::clone(&self.board))
    }

    /// Record `task` as blocked because a dependency cannot complete.
    pub fn block(&self, plan: &WorkflowPlan, task: &AgentTask) {
        let reason = self
            .board
            .readiness(task)
            .and_then(|r| r.blocked_reason())
            .unwrap_or_else(|| "no admissible path to run".to_string());
        warn!(plan_id = %plan.plan_id, task_id = %task.task_id, reason = %reason, "Task blocked");
        self.board.record(&task.task_id, TaskResult::blocked(reason));
    }

    /// Record a task blocked by a known [`Readiness`] verdict.
    pub fn block_with(&self, plan: &WorkflowPlan, task: &AgentTask, readiness: &Readiness) {
        let reason = readiness
            .blocked_reason()
            .unwrap_or_else(|| "no admissible path to run".to_string());
        warn!(plan_id = %plan.plan_id, task_id = %task.task_id, reason = %reason, "Task blocked");
        self.board.record(&task.task_id, TaskResult::blocked(reason));
    }
}

/// Drives the tasks of a plan to completion under one strategy.
///
/// Returns every result recorded during the run. Tasks a strategy never
/// reached (after a halt) have no entry.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    fn strategy(&self) -> ExecutionStrategy;

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap;
}

/// The executor for `strategy`.
pub fn strategy_executor(strategy: ExecutionStrategy) -> Box<dyn StrategyExecutor> {
    match strategy {
        ExecutionStrategy::Sequential => Box::new(SequentialStrategy),
        ExecutionStrategy::Parallel => Box::new(ParallelStrategy),
        ExecutionStrategy::Pipeline => Box::new(PipelineStrategy),
        ExecutionStrategy::Collaborative => Box::new(CollaborativeStrategy),
        ExecutionStrategy::Adaptive => Box::new(AdaptiveStrategy),
    }
}

/// Unwrap a joined pool task. The pool already recorded the result, so a
/// join error only needs logging.
fn joined(plan: &WorkflowPlan, joined: Result<TaskOutcome, JoinError>) -> Option<TaskOutcome> {
    match joined {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(plan_id = %plan.plan_id, error = %e, "Worker task aborted");
            None
        }
    }
}

/// Whether a finished task stops strategies that halt on failure.
fn halts_run(plan: &WorkflowPlan, task_id: &str, result: &TaskResult) -> bool {
    result.is_failed() && plan.task(task_id).is_some_and(|t| !t.is_optional())
}
