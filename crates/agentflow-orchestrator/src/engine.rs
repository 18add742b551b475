use crate::config::EngineConfig;
use crate::criteria::{check_success_criteria, summarize_results, ResultSummary};
use crate::executor::{CollaborationCoordinator, IdleCoordinator, TaskExecutor};
use crate::graph::validate_plan;
use crate::monitor::ExecutionMonitor;
use crate::pool::WorkerPool;
use crate::strategies::{
    strategy_executor, AdaptiveStrategy, CollaborativeStrategy, ParallelStrategy,
    PipelineStrategy, RunContext, SequentialStrategy, StrategyExecutor,
};
use agentflow_core::{AgentflowError, AgentflowResult, ExecutionStrategy, ResultsMap, WorkflowPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Final outcome of executing a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub plan_id: String,
    pub strategy: ExecutionStrategy,
    pub results: ResultsMap,
    pub summary: ResultSummary,
    /// Whether the plan's success criteria held.
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Executes workflow plans under their declared strategy.
///
/// Each call runs with a fresh result board and worker pool, so one engine
/// can execute several plans concurrently; the monitor is shared.
pub struct WorkflowEngine {
    config: EngineConfig,
    executor: Arc<dyn TaskExecutor>,
    coordinator: Arc<dyn CollaborationCoordinator>,
    monitor: ExecutionMonitor,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            config,
            executor,
            coordinator: Arc::new(IdleCoordinator),
            monitor: ExecutionMonitor::new(),
        }
    }

    /// Replace the coordinator started by collaborative runs.
    pub fn with_coordinator(mut self, coordinator: Arc<dyn CollaborationCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn monitor(&self) -> &ExecutionMonitor {
        &self.monitor
    }

    /// Validate `plan`, run it under `plan.strategy` and evaluate its success
    /// criteria.
    ///
    /// Only validation can fail: with `strict_validation` a plan with a
    /// cycle, a dangling dependency, duplicate ids or a diverged dependency
    /// graph is rejected before any task runs. Task failures are reported in
    /// the returned results.
    pub async fn execute(&self, plan: &WorkflowPlan) -> AgentflowResult<WorkflowRun> {
        self.check_plan(plan)?;

        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            plan_id = %plan.plan_id,
            strategy = %plan.strategy,
            tasks = plan.tasks.len(),
            "Executing workflow plan"
        );

        let strategy = strategy_executor(plan.strategy);
        let results = self.run_with(strategy.as_ref(), plan).await;

        let summary = summarize_results(&results);
        let success = check_success_criteria(plan, &results);
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            plan_id = %plan.plan_id,
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total,
            success,
            duration_ms,
            "Workflow plan finished"
        );

        Ok(WorkflowRun {
            plan_id: plan.plan_id.clone(),
            strategy: plan.strategy,
            results,
            summary,
            success,
            started_at,
            duration_ms,
        })
    }

    pub async fn execute_sequential(&self, plan: &WorkflowPlan) -> ResultsMap {
        self.run_with(&SequentialStrategy, plan).await
    }

    pub async fn execute_parallel(&self, plan: &WorkflowPlan) -> ResultsMap {
        self.run_with(&ParallelStrategy, plan).await
    }

    pub async fn execute_pipeline(&self, plan: &WorkflowPlan) -> ResultsMap {
        self.run_with(&PipelineStrategy, plan).await
    }

    pub async fn execute_collaborative(&self, plan: &WorkflowPlan) -> ResultsMap {
        self.run_with(&CollaborativeStrategy, plan).await
    }

    pub async fn execute_adaptive(&self, plan: &WorkflowPlan) -> ResultsMap {
        self.run_with(&AdaptiveStrategy, plan).await
    }

    async fn run_with(&self, strategy: &dyn StrategyExecutor, plan: &WorkflowPlan) -> ResultsMap {
        let pool = WorkerPool::new(
            self.config.effective_parallelism(),
            Arc::clone(&self.executor),
            self.monitor.clone(),
        );
        let run = RunContext::new(self.config.clone(), pool, Arc::clone(&self.coordinator));
        info!(
            plan_id = %plan.plan_id,
            strategy = %strategy.strategy(),
            max_parallel = run.pool.capacity(),
            "Starting strategy"
        );
        strategy.run(plan, &run).await
    }

    fn check_plan(&self, plan: &WorkflowPlan) -> AgentflowResult<()> {
        let report = validate_plan(plan);
        if report.is_clean() {
            return Ok(());
        }
        let description = report.describe();
        if self.config.strict_validation {
            return Err(AgentflowError::Plan(format!(
                "plan {} rejected: {description}",
                plan.plan_id
            )));
        }
        warn!(plan_id = %plan.plan_id, issues = %description, "Running plan with graph issues");
        Ok(())
    }
}
