use super::{joined, RunContext, StrategyExecutor};
use crate::planner::enhance_task_for_collaboration;
use agentflow_core::{ExecutionStrategy, ResultsMap, WorkflowPlan};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs every task concurrently on a shared collaboration channel while the
/// engine's [`CollaborationCoordinator`](crate::executor::CollaborationCoordinator)
/// runs alongside.
///
/// Every task starts at once, ungated by dependencies and outside the pool's
/// cap, since peers may wait on each other through the board. Each task is
/// stamped with the channel and sharing flag on a per-run copy, so the plan
/// itself is left untouched. The coordinator is cancelled once every task has
/// finished.
pub struct CollaborativeStrategy;

#[async_trait]
impl StrategyExecutor for CollaborativeStrategy {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Collaborative
    }

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap {
        let channel = run.config.collaboration_channel(&plan.plan_id);
        info!(
            plan_id = %plan.plan_id,
            channel = %channel,
            tasks = plan.tasks.len(),
            "Running plan collaboratively"
        );

        let coordinator = {
            let coordinator = Arc::clone(&run.coordinator);
            let channel = channel.clone();
            tokio::spawn(async move { coordinator.coordinate(&channel).await })
        };

        let mut in_flight = JoinSet::new();
        for task in &plan.tasks {
            let stamped = enhance_task_for_collaboration(task.clone(), &channel);
            let ctx = run
                .task_context(plan)
                .with_collaboration_channel(channel.clone());
            run.pool.spawn_unbounded(&mut in_flight, stamped, ctx);
        }
        while let Some(next) = in_flight.join_next().await {
            joined(plan, next);
        }

        coordinator.abort();
        match coordinator.await {
            Ok(Ok(())) => debug!(channel = %channel, "Coordinator finished"),
            Ok(Err(e)) => warn!(channel = %channel, error = %e, "Coordinator failed"),
            Err(e) if e.is_cancelled() => debug!(channel = %channel, "Coordinator cancelled"),
            Err(e) => warn!(channel = %channel, error = %e, "Coordinator panicked"),
        }

        run.board.snapshot()
    }
}
