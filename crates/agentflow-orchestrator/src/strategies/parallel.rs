use super::{joined, RunContext, StrategyExecutor};
use crate::graph::dependencies_met;
use agentflow_core::{AgentTask, ExecutionStrategy, ResultsMap, WorkflowPlan};
use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Runs every task as soon as its dependencies completed, up to the pool's
/// capacity at a time.
///
/// Admission scans pending tasks in plan order. Failures do not stop the run.
/// When nothing is running and no pending task is admissible, the remaining
/// tasks are recorded as blocked.
pub struct ParallelStrategy;

#[async_trait]
impl StrategyExecutor for ParallelStrategy {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Parallel
    }

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap {
        info!(
            plan_id = %plan.plan_id,
            tasks = plan.tasks.len(),
            max_parallel = run.pool.capacity(),
            "Running plan in parallel"
        );

        let mut pending: Vec<AgentTask> = plan.tasks.clone();
        let mut in_flight = JoinSet::new();

        while !pending.is_empty() || !in_flight.is_empty() {
            let results = run.board.snapshot();
            let mut i = 0;
            while i < pending.len() && in_flight.len() < run.pool.capacity() {
                if dependencies_met(&pending[i], &results) {
                    let task = pending.remove(i);
                    debug!(plan_id = %plan.plan_id, task_id = %task.task_id, "Admitting task");
                    run.pool.spawn(&mut in_flight, task, run.task_context(plan));
                } else {
                    i += 1;
                }
            }

            if in_flight.is_empty() {
                for task in pending.drain(..) {
                    run.block(plan, &task);
                }
                break;
            }

            // wait for one completion, then take whatever else is done
            if let Some(next) = in_flight.join_next().await {
                joined(plan, next);
            }
            while let Some(next) = in_flight.try_join_next() {
                joined(plan, next);
            }
        }

        run.board.snapshot()
    }
}
