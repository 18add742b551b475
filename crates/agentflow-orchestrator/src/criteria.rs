//! Post-run success evaluation.
//!
//! Criteria are short declarative strings attached to a plan by the upstream
//! planner. A handful of phrasings are recognised (case-insensitively):
//!
//! | criterion | passes when |
//! |---|---|
//! | `all tasks completed` | every recorded result is completed |
//! | `no failure` / `no failures` | no recorded result failed |
//! | `success rate >= 80%` | completed / recorded ≥ 0.80 (false with no results) |
//! | `task:<id> completed` | that task's result is completed |
//!
//! Any other string passes. Unrecognised criteria are logged at `warn` so a
//! typo shows up in the logs instead of failing the plan.

use agentflow_core::{ResultsMap, WorkflowPlan};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

#[allow(clippy::expect_used)]
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static regex is valid"));

#[allow(clippy::expect_used)]
static TASK_COMPLETED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)task:\s*(\S+)\s+completed").expect("static regex is valid")
});

/// Whether a finished run satisfied its plan.
///
/// Any task not marked optional whose result is missing or not `completed`
/// fails the plan outright, before the declared criteria are looked at.
pub fn check_success_criteria(plan: &WorkflowPlan, results: &ResultsMap) -> bool {
    for task in plan.tasks.iter().filter(|t| !t.is_optional()) {
        let completed = results.get(&task.task_id).is_some_and(|r| r.is_completed());
        if !completed {
            debug!(
                plan_id = %plan.plan_id,
                task_id = %task.task_id,
                "Required task did not complete"
            );
            return false;
        }
    }

    plan.success_criteria
        .iter()
        .all(|criterion| evaluate_success_criterion(criterion, results))
}

/// Evaluate a single criterion string against the results of a run.
pub fn evaluate_success_criterion(criterion: &str, results: &ResultsMap) -> bool {
    let lowered = criterion.to_lowercase();

    if let Some(caps) = TASK_COMPLETED_RE.captures(criterion) {
        let task_id = caps.get(1).map_or("", |m| m.as_str());
        return results.get(task_id).is_some_and(|r| r.is_completed());
    }

    if lowered.contains("all tasks completed") {
        return results.values().all(|r| r.is_completed());
    }

    if lowered.contains("no failure") {
        return !results.values().any(|r| r.is_failed());
    }

    if lowered.contains("success rate") {
        let threshold = PERCENT_RE
            .captures(&lowered)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(threshold) = threshold {
            if results.is_empty() {
                return false;
            }
            let completed = results.values().filter(|r| r.is_completed()).count();
            return completed as f64 * 100.0 >= threshold * results.len() as f64;
        }
    }

    warn!(criterion = %criterion, "Unrecognised success criterion, treating as satisfied");
    true
}

/// Aggregate counts for a results map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// `completed / total`, or `0.0` for an empty run.
    pub success_rate: f64,
}

pub fn summarize_results(results: &ResultsMap) -> ResultSummary {
    let total = results.len();
    let completed = results.values().filter(|r| r.is_completed()).count();
    let failed = results.values().filter(|r| r.is_failed()).count();
    let success_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    };
    ResultSummary {
        total,
        completed,
        failed,
        success_rate,
    }
}
