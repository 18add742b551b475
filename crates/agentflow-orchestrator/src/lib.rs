//! Workflow planning and multi-strategy execution of agent task graphs.
//!
//! Turns upstream planning data into a validated [`WorkflowPlan`] and drives
//! its tasks to completion under one of five strategies, recording one
//! result per task and evaluating the plan's success criteria afterwards.
//!
//! # Main types
//!
//! - [`WorkflowPlanner`]: Builds plans from a [`PlanningSource`], falling back to a fixed plan.
//! - [`WorkflowEngine`]: Validates and executes plans, returning a [`WorkflowRun`].
//! - [`StrategyExecutor`]: One implementation per execution strategy.
//! - [`WorkerPool`]: Shared concurrency cap for every strategy.
//! - [`ResultBoard`]: Write-once results of a run with a completion signal.
//! - [`TaskExecutor`]: Pluggable single-task execution.
//! - [`ExecutionMonitor`]: Per-agent-type activity and metrics.
//!
//! [`WorkflowPlan`]: agentflow_core::WorkflowPlan

/// Run-scoped results and dependency readiness.
pub mod board;
/// Engine configuration.
pub mod config;
/// Success criteria evaluation and result summaries.
pub mod criteria;
/// Workflow engine and strategy dispatch.
pub mod engine;
/// Task execution seams and built-in executors.
pub mod executor;
/// Topological ordering, stage grouping and plan validation.
pub mod graph;
/// Per-agent-type activity tracking.
pub mod monitor;
/// Plan construction from upstream planning data.
pub mod planner;
/// Bounded worker pool.
pub mod pool;
/// Execution strategies.
pub mod strategies;

pub use board::{Readiness, ResultBoard};
pub use config::EngineConfig;
pub use criteria::{
    check_success_criteria, evaluate_success_criterion, summarize_results, ResultSummary,
};
pub use engine::{WorkflowEngine, WorkflowRun};
pub use executor::{
    CollaborationCoordinator, DryRunExecutor, IdleCoordinator, TaskContext, TaskExecutor,
};
pub use graph::{
    dependencies_met, detect_cycle, group_pipeline_stages, topological_sort_tasks, validate_plan,
    PlanValidation,
};
pub use monitor::{AgentMetrics, AgentState, ExecutionMonitor, WorkerStatus};
pub use planner::{
    build_workflow_plan, create_fallback_plan, create_simple_workflow_plan,
    enhance_task_for_collaboration, PlanningSource, StaticPlanningSource, WorkflowPlanner,
};
pub use pool::{TaskOutcome, WorkerPool};
pub use strategies::{
    select_adaptive_strategy, strategy_executor, AdaptiveStrategy, CollaborativeStrategy,
    ParallelStrategy, PipelineStrategy, RunContext, SequentialStrategy, StrategyExecutor,
};
