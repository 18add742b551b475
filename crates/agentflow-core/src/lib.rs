//! Task graph model and error definitions for the agentflow workflow core.
//!
//! This crate is the leaf of the workspace: it holds the value types that the
//! planner builds and the execution engine consumes, and carries no behavior
//! beyond their invariants.
//!
//! # Main types
//!
//! - [`AgentTask`]: A single unit of agent work with declared predecessors.
//! - [`WorkflowPlan`]: A goal decomposed into tasks plus a chosen strategy.
//! - [`ExecutionStrategy`]: The scheduling algorithm a plan runs under.
//! - [`AgentCapability`]: Capability tags a task may require.
//! - [`TaskResult`] / [`TaskStatus`]: Per-task outcome records.
//! - [`AgentflowError`]: Unified error enum for plan and config faults.

/// Workflow plans and execution strategies.
pub mod plan;
/// Per-task result records.
pub mod result;
/// Agent tasks and capability tags.
pub mod task;

pub use plan::{ExecutionStrategy, WorkflowPlan};
pub use result::{ResultsMap, TaskResult, TaskStatus};
pub use task::{AgentCapability, AgentTask};

// --- Error types ---

/// Top-level error type for the agentflow workspace.
///
/// A task that fails while executing is *not* an error: it is recorded as a
/// [`TaskStatus::Failed`] result. These variants cover faults that stop a plan
/// from being built or run at all.
#[derive(Debug, thiserror::Error)]
pub enum AgentflowError {
    /// The plan could not be built or failed strict validation.
    #[error("Plan error: {0}")]
    Plan(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience `Result` alias using [`AgentflowError`].
pub type AgentflowResult<T> = Result<T, AgentflowError>;
