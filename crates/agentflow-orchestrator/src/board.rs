use agentflow_core::{AgentTask, ResultsMap, TaskResult, TaskStatus};
use parking_lot::RwLock;
use std::collections::HashSet;
use tokio::sync::Notify;
use tracing::warn;

/// Whether a task's dependencies allow it to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every dependency completed.
    Ready,
    /// `dependency` will never complete: it finished with another status
    /// (`status` is set) or it has no result and is not running (`None`).
    Unsatisfiable {
        dependency: String,
        status: Option<TaskStatus>,
    },
}

impl Readiness {
    /// Reason string for a task that cannot run.
    pub fn blocked_reason(&self) -> Option<String> {
        match self {
            Readiness::Ready => None,
            Readiness::Unsatisfiable {
                dependency,
                status: Some(status),
            } => Some(format!("dependency {dependency} finished as {status}")),
            Readiness::Unsatisfiable {
                dependency,
                status: None,
            } => Some(format!("dependency {dependency} never ran")),
        }
    }
}

#[derive(Default)]
struct BoardState {
    results: ResultsMap,
    in_flight: HashSet<String>,
}

/// Results of one plan run, shared by every branch of that run.
///
/// Each `task_id` is written at most once. Recording a result wakes every
/// task parked in [`ResultBoard::wait_for_dependencies`], so dependents react
/// to completions as they happen.
#[derive(Default)]
pub struct ResultBoard {
    state: RwLock<BoardState>,
    changed: Notify,
}

impl ResultBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that a task has been admitted and will produce a result.
    pub fn mark_in_flight(&self, task_id: &str) {
        self.state.write().in_flight.insert(task_id.to_string());
    }

    pub fn is_in_flight(&self, task_id: &str) -> bool {
        self.state.read().in_flight.contains(task_id)
    }

    /// Store the result for `task_id` and wake waiters.
    ///
    /// Returns `false` (keeping the first result) if the task already has one.
    pub fn record(&self, task_id: &str, result: TaskResult) -> bool {
        let inserted = {
            let mut state = self.state.write();
            state.in_flight.remove(task_id);
            if state.results.contains_key(task_id) {
                false
            } else {
                state.results.insert(task_id.to_string(), result);
                true
            }
        };
        if inserted {
            self.changed.notify_waiters();
        } else {
            warn!(task_id = %task_id, "Result already recorded, ignoring second write");
        }
        inserted
    }

    pub fn get(&self, task_id: &str) -> Option<TaskResult> {
        self.state.read().results.get(task_id).cloned()
    }

    /// Copy of every result recorded so far.
    pub fn snapshot(&self) -> ResultsMap {
        self.state.read().results.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dependencies_met(&self, task: &AgentTask) -> bool {
        crate::graph::dependencies_met(task, &self.state.read().results)
    }

    /// `None` while some dependency is still running and none has already
    /// ruled the task out.
    pub fn readiness(&self, task: &AgentTask) -> Option<Readiness> {
        let state = self.state.read();
        let mut waiting = false;
        for dep in &task.dependencies {
            match state.results.get(dep) {
                Some(result) if result.is_completed() => {}
                Some(result) => {
                    return Some(Readiness::Unsatisfiable {
                        dependency: dep.clone(),
                        status: Some(result.status),
                    });
                }
                None if state.in_flight.contains(dep) => waiting = true,
                None => {
                    return Some(Readiness::Unsatisfiable {
                        dependency: dep.clone(),
                        status: None,
                    });
                }
            }
        }
        if waiting {
            None
        } else {
            Some(Readiness::Ready)
        }
    }

    /// Wait until `task` can run or is known never to be able to.
    pub async fn wait_for_dependencies(&self, task: &AgentTask) -> Readiness {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // register before checking so a record() in between is not missed
            notified.as_mut().enable();
            if let Some(readiness) = self.readiness(task) {
                return readiness;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn task(id: &str, deps: &[&str]) -> AgentTask {
        AgentTask::new(id, "general", "process").with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_record_is_write_once() {
        let board = ResultBoard::new();
        assert!(board.record("a", TaskResult::new(TaskStatus::Completed)));
        assert!(!board.record("a", TaskResult::failed("late")));
        assert!(board.get("a").unwrap().is_completed());
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_readiness_states() {
        let board = ResultBoard::new();
        let t = task("c", &["a", "b"]);

        assert_eq!(
            board.readiness(&t),
            Some(Readiness::Unsatisfiable {
                dependency: "a".into(),
                status: None
            })
        );

        board.mark_in_flight("a");
        board.mark_in_flight("b");
        assert_eq!(board.readiness(&t), None);

        board.record("a", TaskResult::new(TaskStatus::Completed));
        assert_eq!(board.readiness(&t), None);
        assert!(!board.dependencies_met(&t));

        board.record("b", TaskResult::new(TaskStatus::Completed));
        assert_eq!(board.readiness(&t), Some(Readiness::Ready));
        assert!(board.dependencies_met(&t));
        assert!(!board.is_in_flight("b"));
    }

    #[test]
    fn test_failed_dependency_is_unsatisfiable() {
        let board = ResultBoard::new();
        board.record("a", TaskResult::failed("boom"));
        let readiness = board.readiness(&task("b", &["a"])).unwrap();
        assert_eq!(
            readiness.blocked_reason().unwrap(),
            "dependency a finished as failed"
        );
    }

    #[tokio::test]
    async fn test_wait_wakes_on_completion() {
        let board = Arc::new(ResultBoard::new());
        board.mark_in_flight("a");

        let waiter = {
            let board = Arc::clone(&board);
            tokio::spawn(async move { board.wait_for_dependencies(&task("b", &["a"])).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        board.record("a", TaskResult::new(TaskStatus::Completed));
        let readiness = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_unsatisfiable() {
        let board = ResultBoard::new();
        let readiness = board.wait_for_dependencies(&task("b", &["ghost"])).await;
        assert_eq!(readiness.blocked_reason().unwrap(), "dependency ghost never ran");
    }
}
