use super::{halts_run, joined, RunContext, StrategyExecutor};
use crate::graph::group_pipeline_stages;
use agentflow_core::{ExecutionStrategy, ResultsMap, TaskResult, WorkflowPlan};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Runs the plan stage by stage; the tasks of one stage run concurrently.
///
/// Completed tasks' outputs are merged into a pipeline context handed to
/// every later stage. Merging follows task order within the stage, so a key
/// written by two tasks of the same stage keeps the later task's value.
/// A non-optional failure stops the run after its stage.
pub struct PipelineStrategy;

/// Fold the outputs of completed tasks into `context`.
fn merge_stage_outputs(
    context: &mut Map<String, Value>,
    stage_ids: &[String],
    outcomes: &HashMap<String, TaskResult>,
) {
    for id in stage_ids {
        let Some(result) = outcomes.get(id) else {
            continue;
        };
        if !result.is_completed() {
            continue;
        }
        if let Some(output) = &result.output {
            for (key, value) in output {
                context.insert(key.clone(), value.clone());
            }
        }
    }
}

#[async_trait]
impl StrategyExecutor for PipelineStrategy {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Pipeline
    }

    async fn run(&self, plan: &WorkflowPlan, run: &RunContext) -> ResultsMap {
        let stages = group_pipeline_stages(&plan.tasks, &plan.dependencies_graph);
        info!(plan_id = %plan.plan_id, stages = stages.len(), "Running plan as pipeline");

        let mut pipeline_context = Map::new();

        for (index, stage) in stages.into_iter().enumerate() {
            let stage_ids: Vec<String> = stage.iter().map(|t| t.task_id.clone()).collect();
            info!(plan_id = %plan.plan_id, stage = index, tasks = stage.len(), "Starting stage");

            let mut in_flight = JoinSet::new();
            for task in stage {
                if !run.board.dependencies_met(&task) {
                    warn!(
                        plan_id = %plan.plan_id,
                        task_id = %task.task_id,
                        "Dependencies not satisfied, running anyway"
                    );
                }
                let ctx = run
                    .task_context(plan)
                    .with_pipeline_context(pipeline_context.clone());
                run.pool.spawn(&mut in_flight, task, ctx);
            }

            let mut outcomes = HashMap::new();
            while let Some(next) = in_flight.join_next().await {
                if let Some((task_id, result)) = joined(plan, next) {
                    outcomes.insert(task_id, result);
                }
            }

            merge_stage_outputs(&mut pipeline_context, &stage_ids, &outcomes);

            let halted = stage_ids
                .iter()
                .find(|id| outcomes.get(*id).is_some_and(|r| halts_run(plan, id, r)));
            if let Some(task_id) = halted {
                warn!(
                    plan_id = %plan.plan_id,
                    stage = index,
                    task_id = %task_id,
                    "Required task failed, halting pipeline"
                );
                break;
            }
        }

        run.board.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(pairs: &[(&str, Value)]) -> TaskResult {
        let output = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        TaskResult::completed(output)
    }

    #[test]
    fn test_merge_follows_stage_order() {
        let mut outcomes = HashMap::new();
        outcomes.insert("b".to_string(), completed(&[("k", json!("from b"))]));
        outcomes.insert("a".to_string(), completed(&[("k", json!("from a")), ("x", json!(1))]));
        outcomes.insert("c".to_string(), TaskResult::failed("no output"));

        let mut context = Map::new();
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        merge_stage_outputs(&mut context, &ids, &outcomes);

        assert_eq!(context["k"], "from b");
        assert_eq!(context["x"], 1);
        assert_eq!(context.len(), 2);
    }
}
