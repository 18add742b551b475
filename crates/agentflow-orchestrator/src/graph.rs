//! Dependency-graph utilities shared by the planner and every strategy.
//!
//! None of these functions reject a malformed graph. Cycles and references to
//! tasks outside the set degrade to a best-effort ordering: the sort appends
//! the stuck tasks at the end and the stage grouping dumps them into one final
//! stage. [`detect_cycle`] and [`validate_plan`] exist so callers can find out
//! up front instead.

use agentflow_core::{AgentTask, ResultsMap, WorkflowPlan};
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Dependencies of `task`, read from `dependencies` first and falling back to
/// the task's own list when the map has no entry for it.
fn deps_of<'a>(
    task: &'a AgentTask,
    dependencies: &'a HashMap<String, Vec<String>>,
) -> &'a [String] {
    dependencies
        .get(&task.task_id)
        .map_or(task.dependencies.as_slice(), Vec::as_slice)
}

/// Heap entry: highest priority first, then earliest position.
#[derive(PartialEq, Eq)]
struct Ready {
    priority: i64,
    position: Reverse<usize>,
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Kahn's-algorithm ordering with priority tie-breaking.
///
/// A task's in-degree is the number of dependencies it declares, counting ids
/// outside `tasks` too. Scheduling a task decrements the in-degree of every
/// task that depends on it. Among ready tasks the highest `priority` goes
/// first, then the earliest in `tasks`.
///
/// Tasks that never reach zero (cycle members, tasks downstream of a cycle,
/// tasks waiting on an unknown id) are appended in their original order, so
/// the result always holds every task exactly once.
pub fn topological_sort_tasks(
    tasks: &[AgentTask],
    dependencies: &HashMap<String, Vec<String>>,
) -> Vec<AgentTask> {
    let mut in_degree: Vec<usize> = Vec::with_capacity(tasks.len());
    let mut dependents: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, task) in tasks.iter().enumerate() {
        let deps = deps_of(task, dependencies);
        in_degree.push(deps.len());
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(i);
        }
    }

    let mut ready: BinaryHeap<Ready> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(i, _)| Ready {
            priority: tasks[i].priority,
            position: Reverse(i),
        })
        .collect();

    let mut placed = vec![false; tasks.len()];
    let mut ordered = Vec::with_capacity(tasks.len());

    while let Some(Ready {
        position: Reverse(i),
        ..
    }) = ready.pop()
    {
        placed[i] = true;
        ordered.push(tasks[i].clone());

        if let Some(children) = dependents.get(tasks[i].task_id.as_str()) {
            for &child in children {
                in_degree[child] = in_degree[child].saturating_sub(1);
                if in_degree[child] == 0 && !placed[child] {
                    ready.push(Ready {
                        priority: tasks[child].priority,
                        position: Reverse(child),
                    });
                }
            }
        }
    }

    for (i, task) in tasks.iter().enumerate() {
        if !placed[i] {
            ordered.push(task.clone());
        }
    }

    ordered
}

/// True iff every dependency of `task` has a result with status `Completed`.
pub fn dependencies_met(task: &AgentTask, results: &ResultsMap) -> bool {
    task.dependencies
        .iter()
        .all(|dep| results.get(dep).is_some_and(|r| r.is_completed()))
}

/// Partition tasks into stages whose dependencies are satisfied by earlier stages.
///
/// Each pass collects, in original order, every unplaced task whose
/// dependencies were all placed in a previous stage. A pass that places
/// nothing means a cycle or an external dependency; everything still unplaced
/// becomes one final stage.
pub fn group_pipeline_stages(
    tasks: &[AgentTask],
    dependencies: &HashMap<String, Vec<String>>,
) -> Vec<Vec<AgentTask>> {
    let mut stages: Vec<Vec<AgentTask>> = Vec::new();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&AgentTask> = tasks.iter().collect();

    while !remaining.is_empty() {
        let (stage, rest): (Vec<&AgentTask>, Vec<&AgentTask>) =
            remaining.into_iter().partition(|t| {
                deps_of(t, dependencies)
                    .iter()
                    .all(|d| placed.contains(d.as_str()))
            });

        if stage.is_empty() {
            stages.push(rest.into_iter().cloned().collect());
            break;
        }

        placed.extend(stage.iter().map(|t| t.task_id.as_str()));
        stages.push(stage.into_iter().cloned().collect());
        remaining = rest;
    }

    stages
}

/// Find one dependency cycle among `tasks`, returned as the path that closes it
/// (`a -> b -> a` comes back as `["a", "b", "a"]`).
///
/// References to ids outside `tasks` are ignored here; see [`validate_plan`].
pub fn detect_cycle(
    tasks: &[AgentTask],
    dependencies: &HashMap<String, Vec<String>>,
) -> Option<Vec<String>> {
    let by_id: HashMap<&str, &AgentTask> =
        tasks.iter().map(|t| (t.task_id.as_str(), t)).collect();
    // 1 = on the current path, 2 = fully explored
    let mut visited: HashMap<&str, u8> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();

    for task in tasks {
        if dfs_cycle(task.task_id.as_str(), &by_id, dependencies, &mut visited, &mut path) {
            return Some(path.into_iter().map(str::to_string).collect());
        }
    }
    None
}

fn dfs_cycle<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a AgentTask>,
    dependencies: &'a HashMap<String, Vec<String>>,
    visited: &mut HashMap<&'a str, u8>,
    path: &mut Vec<&'a str>,
) -> bool {
    match visited.get(id) {
        Some(1) => {
            // back edge: keep only the looping part of the path
            if let Some(start) = path.iter().position(|p| *p == id) {
                path.drain(..start);
            }
            path.push(id);
            return true;
        }
        Some(2) => return false,
        _ => {}
    }
    let Some(&task) = by_id.get(id) else {
        return false;
    };

    visited.insert(id, 1);
    path.push(id);
    for dep in deps_of(task, dependencies) {
        if dfs_cycle(dep.as_str(), by_id, dependencies, visited, path) {
            return true;
        }
    }
    path.pop();
    visited.insert(id, 2);
    false
}

/// Structural problems found in a plan's dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanValidation {
    /// One cycle, if any exists.
    pub cycle: Option<Vec<String>>,
    /// `(task_id, missing_dependency)` pairs.
    pub dangling: Vec<(String, String)>,
    /// Tasks whose graph entry disagrees with their own dependency list.
    pub divergent: Vec<String>,
    /// Task ids that appear more than once.
    pub duplicate_ids: Vec<String>,
}

impl PlanValidation {
    pub fn is_clean(&self) -> bool {
        self.cycle.is_none()
            && self.dangling.is_empty()
            && self.divergent.is_empty()
            && self.duplicate_ids.is_empty()
    }

    /// One-line human-readable description of every problem found.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(cycle) = &self.cycle {
            parts.push(format!("dependency cycle {}", cycle.join(" -> ")));
        }
        for (task, dep) in &self.dangling {
            parts.push(format!("task {task} depends on unknown task {dep}"));
        }
        if !self.divergent.is_empty() {
            parts.push(format!(
                "dependency graph diverges from task dependencies for {}",
                self.divergent.join(", ")
            ));
        }
        if !self.duplicate_ids.is_empty() {
            parts.push(format!("duplicate task ids {}", self.duplicate_ids.join(", ")));
        }
        parts.join("; ")
    }
}

/// Inspect a plan for cycles, dangling references, graph divergence and
/// duplicate task ids. Never fails; the caller decides what to do with the report.
pub fn validate_plan(plan: &WorkflowPlan) -> PlanValidation {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicate_ids = Vec::new();
    for task in &plan.tasks {
        if !seen.insert(task.task_id.as_str()) && !duplicate_ids.contains(&task.task_id) {
            duplicate_ids.push(task.task_id.clone());
        }
    }

    let mut dangling = Vec::new();
    for task in &plan.tasks {
        let graph_deps = deps_of(task, &plan.dependencies_graph);
        for dep in task.dependencies.iter().chain(graph_deps) {
            let pair = (task.task_id.clone(), dep.clone());
            if !seen.contains(dep.as_str()) && !dangling.contains(&pair) {
                dangling.push(pair);
            }
        }
    }

    PlanValidation {
        cycle: detect_cycle(&plan.tasks, &plan.dependencies_graph),
        dangling,
        divergent: plan.graph_divergence(),
        duplicate_ids,
    }
}
