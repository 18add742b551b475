//! Turns loosely-structured upstream planning data into a [`WorkflowPlan`].
//!
//! Planning data comes from an LLM (or from [`create_fallback_plan`]) and is
//! treated as untrusted: every field is optional, wrong types fall back to
//! defaults, unknown capability tags are dropped and an unknown strategy
//! becomes [`ExecutionStrategy::Sequential`]. Building a plan never fails.

use crate::graph::validate_plan;
use agentflow_core::task::{COLLABORATION_CHANNEL_KEY, ENABLE_SHARING_KEY};
use agentflow_core::{
    AgentCapability, AgentTask, AgentflowError, AgentflowResult, ExecutionStrategy, WorkflowPlan,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn new_plan_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("plan_{}", &raw[..8])
}

fn object_field(value: &Value, key: &str) -> HashMap<String, Value> {
    match value.get(key) {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(Value::Null) | None => HashMap::new(),
        Some(other) => {
            warn!(field = key, value = %other, "Expected an object in plan data, ignoring");
            HashMap::new()
        }
    }
}

/// String entries of `items`, and the entries that were not strings.
fn split_strings(items: &[Value]) -> (Vec<String>, Vec<&Value>) {
    let mut strings = Vec::new();
    let mut rest = Vec::new();
    for item in items {
        match item.as_str() {
            Some(s) => strings.push(s.to_string()),
            None => rest.push(item),
        }
    }
    (strings, rest)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => {
            let (strings, dropped) = split_strings(items);
            for item in dropped {
                warn!(field = key, value = %item, "Dropping non-string entry in plan data");
            }
            strings
        }
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn integer_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn float_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_field(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn parse_capabilities(raw: &Value, task_id: &str) -> BTreeSet<AgentCapability> {
    let mut capabilities = BTreeSet::new();
    for name in string_list(raw, "capabilities_required") {
        match name.parse::<AgentCapability>() {
            Ok(cap) => {
                capabilities.insert(cap);
            }
            Err(_) => {
                warn!(task_id = %task_id, capability = %name, "Dropping unknown capability");
            }
        }
    }
    capabilities
}

fn parse_strategy(plan_data: &Value) -> ExecutionStrategy {
    match plan_data.get("strategy").and_then(Value::as_str) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(strategy = %raw, "Unknown execution strategy, defaulting to sequential");
            ExecutionStrategy::Sequential
        }),
        None => ExecutionStrategy::Sequential,
    }
}

/// Build a plan from upstream planning data.
///
/// Task ids are `{plan_id}_task_{index}` where `index` is the task's 0-based
/// position in `plan_data.tasks`. Dependencies are copied verbatim into both the
/// task and `dependencies_graph`; nothing checks that they refer to real tasks.
/// Structural problems are logged, not rejected.
pub fn build_workflow_plan(goal: &str, plan_data: &Value) -> WorkflowPlan {
    let plan_id = new_plan_id();
    let strategy = parse_strategy(plan_data);

    let raw_tasks: &[Value] = plan_data
        .get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for (index, raw) in raw_tasks.iter().enumerate() {
        if !raw.is_object() {
            warn!(plan_id = %plan_id, index, "Skipping malformed task entry");
            continue;
        }
        let task_id = format!("{plan_id}_task_{index}");
        let capabilities_required = parse_capabilities(raw, &task_id);
        tasks.push(AgentTask {
            agent_type: text_field(raw, "agent", "general"),
            action: text_field(raw, "action", "process"),
            inputs: object_field(raw, "inputs"),
            dependencies: string_list(raw, "dependencies"),
            priority: integer_field(raw, "priority"),
            capabilities_required,
            metadata: object_field(raw, "metadata"),
            task_id,
        });
    }

    let mut plan = WorkflowPlan::new(plan_id, goal, strategy, tasks);
    plan.success_criteria = string_list(plan_data, "success_criteria");
    plan.estimated_duration = float_field(plan_data, "estimated_duration");
    plan.resource_requirements = object_field(plan_data, "resource_requirements");

    let report = validate_plan(&plan);
    if !report.is_clean() {
        warn!(plan_id = %plan.plan_id, issues = %report.describe(), "Plan has structural issues");
    }

    info!(
        plan_id = %plan.plan_id,
        strategy = %plan.strategy,
        tasks = plan.tasks.len(),
        "Workflow plan built"
    );
    plan
}

/// Raw planning data for a two-step sequential plan: classify the request,
/// then process the goal. Used when upstream planning fails.
pub fn create_fallback_plan(goal: &str) -> Value {
    json!({
        "strategy": "sequential",
        "tasks": [
            {
                "agent": "classifier",
                "action": "classify_request",
                "inputs": { "request": goal },
                "dependencies": [],
                "priority": 2,
                "capabilities_required": ["classification"]
            },
            {
                "agent": "general",
                "action": "process_goal",
                "inputs": { "goal": goal },
                "dependencies": [],
                "priority": 1,
                "capabilities_required": ["text_processing"]
            }
        ],
        "success_criteria": ["all tasks completed"],
        "estimated_duration": 60,
        "resource_requirements": {}
    })
}

/// A single-task sequential plan that hands the goal straight to a general agent.
pub fn create_simple_workflow_plan(goal: &str) -> WorkflowPlan {
    let plan_id = new_plan_id();
    let task = AgentTask::new(format!("{plan_id}_task_0"), "general", "process_goal")
        .with_input("goal", Value::String(goal.to_string()))
        .with_capability(AgentCapability::TextProcessing);
    let mut plan = WorkflowPlan::new(plan_id, goal, ExecutionStrategy::Sequential, vec![task])
        .with_success_criteria(["all tasks completed"]);
    plan.estimated_duration = 30.0;
    plan
}

/// Stamp a task with a collaboration channel and enable context sharing.
///
/// The task is taken by value and handed back, so only an owned copy can be
/// stamped; the plan's own tasks stay untouched.
pub fn enhance_task_for_collaboration(mut task: AgentTask, channel: &str) -> AgentTask {
    task.metadata.insert(
        COLLABORATION_CHANNEL_KEY.to_string(),
        Value::String(channel.to_string()),
    );
    task.metadata
        .insert(ENABLE_SHARING_KEY.to_string(), Value::Bool(true));
    task
}

/// Upstream producer of raw planning data (an LLM planner, a file, ...).
#[async_trait]
pub trait PlanningSource: Send + Sync {
    /// Produce planning data for `goal`.
    async fn plan(&self, goal: &str) -> AgentflowResult<Value>;
}

/// Builds plans from a [`PlanningSource`], falling back to
/// [`create_fallback_plan`] when the source errors or returns no tasks.
pub struct WorkflowPlanner {
    source: Option<Arc<dyn PlanningSource>>,
}

impl WorkflowPlanner {
    pub fn new(source: Arc<dyn PlanningSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A planner with no upstream source; every goal gets the fallback plan.
    pub fn fallback_only() -> Self {
        Self { source: None }
    }

    pub async fn plan(&self, goal: &str) -> WorkflowPlan {
        let data = match &self.source {
            Some(source) => match source.plan(goal).await {
                Ok(data) if has_tasks(&data) => data,
                Ok(_) => {
                    warn!("Planning source returned no tasks, using fallback plan");
                    create_fallback_plan(goal)
                }
                Err(e) => {
                    warn!(error = %e, "Planning source failed, using fallback plan");
                    create_fallback_plan(goal)
                }
            },
            None => create_fallback_plan(goal),
        };
        build_workflow_plan(goal, &data)
    }
}

fn has_tasks(data: &Value) -> bool {
    data.get("tasks")
        .and_then(Value::as_array)
        .is_some_and(|tasks| !tasks.is_empty())
}

/// Planning data kept in memory, mostly for tests and the CLI.
pub struct StaticPlanningSource {
    data: Value,
}

impl StaticPlanningSource {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Parse planning data from a JSON string.
    pub fn from_json(raw: &str) -> AgentflowResult<Self> {
        let data: Value = serde_json::from_str(raw)?;
        if !data.is_object() {
            return Err(AgentflowError::Plan(
                "planning data must be a JSON object".to_string(),
            ));
        }
        Ok(Self::new(data))
    }
}

#[async_trait]
impl PlanningSource for StaticPlanningSource {
    async fn plan(&self, _goal: &str) -> AgentflowResult<Value> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl PlanningSource for FailingSource {
        async fn plan(&self, _goal: &str) -> AgentflowResult<Value> {
            Err(AgentflowError::Plan("LLM unavailable".to_string()))
        }
    }

    #[test]
    fn test_fallback_plan_shape() {
        let goal = "summarise the report";
        let plan = build_workflow_plan(goal, &create_fallback_plan(goal));
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.strategy, ExecutionStrategy::Sequential);
        assert_eq!(plan.dependencies_graph.len(), 2);
        assert!(plan.dependencies_graph.values().all(Vec::is_empty));
        assert_eq!(plan.tasks[0].action, "classify_request");
        assert_eq!(plan.tasks[1].inputs["goal"], "summarise the report");
        assert_eq!(plan.success_criteria, vec!["all tasks completed".to_string()]);
        assert_eq!(plan.estimated_duration, 60.0);
    }

    #[test]
    fn test_task_ids_follow_plan_id() {
        let plan = build_workflow_plan("g", &create_fallback_plan("g"));
        assert!(plan.plan_id.starts_with("plan_"));
        assert_eq!(plan.plan_id.len(), "plan_".len() + 8);
        assert_eq!(plan.tasks[0].task_id, format!("{}_task_0", plan.plan_id));
        assert_eq!(plan.tasks[1].task_id, format!("{}_task_1", plan.plan_id));
    }

    #[test]
    fn test_loose_plan_data() {
        let data = json!({
            "strategy": "Pipeline",
            "tasks": [
                {
                    "agent": "researcher",
                    "action": "search",
                    "inputs": {"query": "rust"},
                    "priority": "3",
                    "capabilities_required": ["web_search", "mind_reading", 7],
                    "dependencies": ["upstream_x", 7]
                },
                "not a task",
                {"priority": 2.9}
            ],
            "success_criteria": ["no failures"],
            "estimated_duration": "12.5",
            "resource_requirements": {"memory_mb": 512}
        });
        let plan = build_workflow_plan("g", &data);
        assert_eq!(plan.strategy, ExecutionStrategy::Pipeline);
        assert_eq!(plan.tasks.len(), 2);

        let first = &plan.tasks[0];
        assert_eq!(first.priority, 3);
        assert_eq!(first.capabilities_required.len(), 1);
        assert!(first.capabilities_required.contains(&AgentCapability::WebSearch));
        assert_eq!(first.dependencies, vec!["upstream_x".to_string()]);
        assert_eq!(plan.dependencies_graph[&first.task_id], first.dependencies);

        // the malformed entry keeps its position in the id sequence
        let second = &plan.tasks[1];
        assert!(second.task_id.ends_with("_task_2"));
        assert_eq!(second.agent_type, "general");
        assert_eq!(second.action, "process");
        assert_eq!(second.priority, 2);

        assert_eq!(plan.estimated_duration, 12.5);
        assert_eq!(plan.resource_requirements["memory_mb"], 512);
    }

    #[test]
    fn test_split_strings_reports_non_strings() {
        let items = vec![json!("web_search"), json!(7), json!(null), json!("code")];
        let (strings, dropped) = split_strings(&items);
        assert_eq!(strings, vec!["web_search", "code"]);
        assert_eq!(dropped, vec![&json!(7), &json!(null)]);
    }

    #[test]
    fn test_unknown_or_missing_strategy_defaults_to_sequential() {
        let unknown = build_workflow_plan("g", &json!({"strategy": "swarm", "tasks": []}));
        assert_eq!(unknown.strategy, ExecutionStrategy::Sequential);
        let missing = build_workflow_plan("g", &json!({}));
        assert_eq!(missing.strategy, ExecutionStrategy::Sequential);
        assert!(missing.tasks.is_empty());
    }

    #[test]
    fn test_simple_plan() {
        let plan = create_simple_workflow_plan("say hi");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.strategy, ExecutionStrategy::Sequential);
        assert!(plan.tasks[0].dependencies.is_empty());
        assert_eq!(plan.tasks[0].inputs["goal"], "say hi");
        assert!(plan.graph_divergence().is_empty());
    }

    #[test]
    fn test_enhance_for_collaboration() {
        let task = AgentTask::new("t", "writer", "draft");
        let stamped = enhance_task_for_collaboration(task.clone(), "agentflow:collab:p1");
        assert_eq!(stamped.collaboration_channel(), Some("agentflow:collab:p1"));
        assert_eq!(stamped.metadata[ENABLE_SHARING_KEY], Value::Bool(true));
        assert!(task.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_planner_uses_source() {
        let source = StaticPlanningSource::from_json(
            r#"{"strategy": "parallel", "tasks": [{"agent": "a", "action": "x"}]}"#,
        )
        .unwrap();
        let planner = WorkflowPlanner::new(Arc::new(source));
        let plan = planner.plan("g").await;
        assert_eq!(plan.strategy, ExecutionStrategy::Parallel);
        assert_eq!(plan.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_planner_falls_back() {
        let planner = WorkflowPlanner::new(Arc::new(FailingSource));
        let plan = planner.plan("g").await;
        assert_eq!(plan.tasks.len(), 2);

        let empty_source = StaticPlanningSource::new(json!({"tasks": []}));
        let empty = WorkflowPlanner::new(Arc::new(empty_source));
        assert_eq!(empty.plan("g").await.tasks.len(), 2);

        assert_eq!(WorkflowPlanner::fallback_only().plan("g").await.tasks.len(), 2);
    }

    #[test]
    fn test_static_source_rejects_non_object() {
        assert!(StaticPlanningSource::from_json("[1, 2]").is_err());
        assert!(StaticPlanningSource::from_json("{oops").is_err());
    }
}
