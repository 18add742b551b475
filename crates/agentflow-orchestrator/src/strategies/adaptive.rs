use super::{joined, RunContext, StrategyExecutor};
use crate::graph::topological_sort_tasks;
use crate::pool::TaskOutcome;
use agentflow_core::{AgentTask, ExecutionStrategy, ResultsMap, WorkflowPlan};
use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::info;

/// Failure ratio above which the run falls back to one task at a time.
const FAILURE_THRESHOLD: f64 = 0.3;
/// Progress needed before a healthy run is widened to parallel.
const PROGRESS_THRESHOLD: f64 = 0.7;
/// Failure ratio below which a run counts as healthy.
const HEALTHY_FAILURE_RATIO: f64 = 0.1;

/// Next strategy for an adaptive run, given progress so far.
///
/// Progress is `completed / total`; the failure ratio is failures per
/// completion (`failed / max(completed, 1)`). A failure ratio above 0.3
/// forces sequential. Otherwise progress above 0.7 with a failure ratio
/// under 0.1 switches to parallel, and anything else keeps `current`.
pub fn select_adaptive_strategy(
    current: ExecutionStrategy,
    completed: usize,
    failed: usize,
    total: usize,
) -> ExecutionStrategy {
    if total == 0 {
        return current;
    }
    let failure_ratio = failed as f64 / completed.max(1) as f64;
    let progress_ratio = completed as f64 / total as f64;

    if failure_ratio > FAILURE_THRESHOLD {
        ExecutionStrategy::Sequential
    } else if progress_ratio > PROGRESS_THRESHOLD && failure_ratio < HEALTHY_FAILURE_RATIO {
        ExecutionStrategy::Parallel
    } else {
        current
    }
}

/// Picks a strategy per iteration from the run's health.
///
/// Pending tasks are kept in topological order. While sequential, an
/// iteration runs the first ready task; under any other strategy it runs up
/// to the pool's capacity of ready tasks and waits for all of them. When no
/// pending task is ready, the rest are recorded as blocked.
pub struct AdaptiveStrategy;

impl AdaptiveStrategy {
    async fn sequential_step(
        plan: &WorkflowPlan,
        run: &RunContext,
        pending: &mut Vec<AgentTask>,
    ) -> Vec<TaskOutcome> {
        let Some(index) = pending.iter().position(|t| run.board.dependencies_met(t)) else {
            return Vec::new();
        };
        let task = pending.remove(index);
        vec![run.pool.run(task, run.task_context(plan)).await]
    }

    async fn parallel_batch(
        plan: &WorkflowPlan,
        run: &RunContext,
        pending: &mut Vec<AgentTask>,
    ) -> Vec<TaskOutcome> {
        let results = run.board.snapshot();
        let mut batch = Vec::new();
        let mut i = 0;
        while i < pending.len() && batch.len() < run.pool.capacity() {
            if crate::graph::dependencies_met(&pending[i], &results) {
                batch.push(pending.remove(i));
            } else {
                i += 1;
            }
        }

        let mut in_flight = JoinSet::new();
        for task in batch {
            run.pool.spawn(&mut in_flight, task, run.task_context(plan));
        }
        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some(next) = in_flight.join_next().await {
            outcomes.extend(joined(plan, next));
        }
        outcomes
    }
}

#[async_trait]
impl StrategyExecutor for AdaptiveStrategy {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Adaptive
    }

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap {
        let total = plan.tasks.len();
        let mut pending = topological_sort_tasks(&plan.tasks, &plan.dependencies_graph);
        let mut current = plan.strategy;
        let mut completed = 0usize;
        let mut failed = 0usize;

        info!(plan_id = %plan.plan_id, tasks = total, "Running plan adaptively");

        while !pending.is_empty() {
            let next = select_adaptive_strategy(current, completed, failed, total);
            if next != current {
                info!(
                    plan_id = %plan.plan_id,
                    from = %current,
                    to = %next,
                    completed,
                    failed,
                    "Switching strategy"
                );
                current = next;
            }

            let outcomes = match current {
                ExecutionStrategy::Sequential => {
                    Self::sequential_step(plan, run, &mut pending).await
                }
                _ => Self::parallel_batch(plan, run, &mut pending).await,
            };

            if outcomes.is_empty() {
                for task in pending.drain(..) {
                    run.block(plan, &task);
                }
                break;
            }

            for (_, result) in &outcomes {
                if result.is_completed() {
                    completed += 1;
                } else {
                    failed += 1;
                }
            }
        }

        run.board.snapshot()
    }
}
