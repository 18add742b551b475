use super::{halts_run, RunContext, StrategyExecutor};
use crate::board::Readiness;
use crate::graph::topological_sort_tasks;
use agentflow_core::{ExecutionStrategy, ResultsMap, WorkflowPlan};
use async_trait::async_trait;
use tracing::{info, warn};

/// Runs tasks one at a time in topological order.
///
/// A task whose dependency cannot complete is recorded as blocked and
/// skipped. The first non-optional task to fail stops the run; tasks after
/// it get no result.
pub struct SequentialStrategy;

#[async_trait]
impl StrategyExecutor for SequentialStrategy {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap {
        let ordered = topological_sort_tasks(&plan.tasks, &plan.dependencies_graph);
        info!(plan_id = %plan.plan_id, tasks = ordered.len(), "Running plan sequentially");

        for task in ordered {
            let readiness = run.board.wait_for_dependencies(&task).await;
            if readiness != Readiness::Ready {
                run.block_with(plan, &task, &readiness);
                continue;
            }

            let ctx = run.task_context(plan);
            let (task_id, result) = run.pool.run(task, ctx).await;
            if halts_run(plan, &task_id, &result) {
                warn!(plan_id = %plan.plan_id, task_id = %task_id, "Required task failed, halting run");
                break;
            }
        }

        run.board.snapshot()
    }
}
