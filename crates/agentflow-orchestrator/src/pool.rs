use crate::executor::{TaskContext, TaskExecutor};
use crate::monitor::ExecutionMonitor;
use agentflow_core::{AgentTask, TaskResult};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// A finished task: its id and the result recorded for it.
pub type TaskOutcome = (String, TaskResult);

/// Bounded set of workers shared by every branch of a run.
///
/// No more than `capacity` tasks admitted through [`run`](Self::run) or
/// [`spawn`](Self::spawn) execute at once, whichever strategy dispatched
/// them. [`spawn_unbounded`](Self::spawn_unbounded) bypasses the cap. Every
/// result produced here is also written to the run's
/// [`ResultBoard`](crate::board::ResultBoard).
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    executor: Arc<dyn TaskExecutor>,
    monitor: ExecutionMonitor,
}

impl WorkerPool {
    pub fn new(
        capacity: usize,
        executor: Arc<dyn TaskExecutor>,
        monitor: ExecutionMonitor,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            executor,
            monitor,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers not currently executing a task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one task to completion on the pool.
    pub async fn run(&self, task: AgentTask, ctx: TaskContext) -> TaskOutcome {
        ctx.board.mark_in_flight(&task.task_id);
        self.dispatch(task, ctx, true).await
    }

    /// Admit a task and execute it in the background; its outcome is
    /// delivered through `set`.
    pub fn spawn(&self, set: &mut JoinSet<TaskOutcome>, task: AgentTask, ctx: TaskContext) {
        ctx.board.mark_in_flight(&task.task_id);
        set.spawn(self.dispatch(task, ctx, true));
    }

    /// Like [`spawn`](Self::spawn) but starts the task without waiting for a
    /// free worker. For peers that may wait on each other.
    pub fn spawn_unbounded(
        &self,
        set: &mut JoinSet<TaskOutcome>,
        task: AgentTask,
        ctx: TaskContext,
    ) {
        ctx.board.mark_in_flight(&task.task_id);
        set.spawn(self.dispatch(task, ctx, false));
    }

    fn dispatch(
        &self,
        task: AgentTask,
        ctx: TaskContext,
        bounded: bool,
    ) -> impl Future<Output = TaskOutcome> + Send + 'static {
        let permits = bounded.then(|| Arc::clone(&self.permits));
        let executor = Arc::clone(&self.executor);
        let monitor = self.monitor.clone();

        async move {
            let task_id = task.task_id.clone();
            let board = Arc::clone(&ctx.board);

            let permit = match permits {
                Some(permits) => permits.acquire_owned().await.map(Some),
                None => Ok(None),
            };
            let result = match permit {
                Ok(_permit) => execute_contained(executor, &monitor, task, ctx).await,
                Err(_) => TaskResult::failed("worker pool closed"),
            };

            board.record(&task_id, result.clone());
            (task_id, result)
        }
    }
}

/// Aborts the wrapped task when dropped, so a cancelled caller does not
/// leave its executor running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn execute_contained(
    executor: Arc<dyn TaskExecutor>,
    monitor: &ExecutionMonitor,
    task: AgentTask,
    ctx: TaskContext,
) -> TaskResult {
    let task_id = task.task_id.clone();
    let agent_type = task.agent_type.clone();
    let plan_id = ctx.plan_id.clone();

    info!(plan_id = %plan_id, task_id = %task_id, agent_type = %agent_type, "Executing task");
    monitor.start_task(&agent_type, &task_id).await;
    let started_at = Utc::now();

    // a panicking executor must not take the run down with it
    let mut handle = AbortOnDrop(tokio::spawn(async move {
        executor.execute(&task, &ctx).await
    }));
    let mut result = match (&mut handle.0).await {
        Ok(result) => result,
        Err(e) => {
            error!(plan_id = %plan_id, task_id = %task_id, error = %e, "Task executor panicked");
            TaskResult::failed(format!("executor panicked: {e}"))
        }
    };

    let finished_at = Utc::now();
    result.started_at.get_or_insert(started_at);
    result.finished_at.get_or_insert(finished_at);
    result.agent_type.get_or_insert_with(|| agent_type.clone());

    let duration_ms = u64::try_from(result.duration_ms().unwrap_or(0)).unwrap_or(0);
    monitor
        .finish_task(&agent_type, &task_id, result.status, duration_ms)
        .await;

    if result.is_completed() {
        info!(plan_id = %plan_id, task_id = %task_id, duration_ms, "Task completed");
    } else {
        warn!(
            plan_id = %plan_id,
            task_id = %task_id,
            status = %result.status,
            error = result.error.as_deref().unwrap_or(""),
            "Task did not complete"
        );
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::board::ResultBoard;
    use agentflow_core::TaskStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Sleepy;

    #[async_trait]
    impl TaskExecutor for Sleepy {
        async fn execute(&self, task: &AgentTask, _ctx: &TaskContext) -> TaskResult {
            tokio::time::sleep(Duration::from_millis(30)).await;
            if task.action == "explode" {
                panic!("kaboom");
            }
            TaskResult::new(TaskStatus::Completed)
        }
    }

    struct Lingering(Arc<AtomicBool>);

    #[async_trait]
    impl TaskExecutor for Lingering {
        async fn execute(&self, _task: &AgentTask, _ctx: &TaskContext) -> TaskResult {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.store(true, Ordering::SeqCst);
            TaskResult::new(TaskStatus::Completed)
        }
    }

    fn pool(capacity: usize) -> (WorkerPool, ExecutionMonitor) {
        let monitor = ExecutionMonitor::new();
        (WorkerPool::new(capacity, Arc::new(Sleepy), monitor.clone()), monitor)
    }

    #[tokio::test]
    async fn test_capacity_bounds_concurrency() {
        let (pool, monitor) = pool(2);
        let board = Arc::new(ResultBoard::new());
        let mut set = JoinSet::new();
        for i in 0..6 {
            let task = AgentTask::new(format!("t{i}"), "general", "process");
            pool.spawn(&mut set, task, TaskContext::new("p", Arc::clone(&board)));
        }
        let mut finished = 0;
        while let Some(joined) = set.join_next().await {
            assert!(joined.unwrap().1.is_completed());
            finished += 1;
        }
        assert_eq!(finished, 6);
        assert_eq!(board.len(), 6);
        assert_eq!(monitor.peak_running().await, 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_one() {
        let (pool, _) = pool(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let (pool, monitor) = pool(1);
        let board = Arc::new(ResultBoard::new());
        let task = AgentTask::new("boom", "general", "explode");
        let (id, result) = pool
            .run(task, TaskContext::new("p", Arc::clone(&board)))
            .await;
        assert_eq!(id, "boom");
        assert!(result.is_failed());
        assert!(result.error.unwrap().contains("panicked"));
        assert!(board.get("boom").unwrap().is_failed());
        assert_eq!(monitor.running().await, 0);
    }

    #[tokio::test]
    async fn test_result_is_stamped() {
        let (pool, _) = pool(1);
        let task = AgentTask::new("t", "summarizer", "process");
        let (_, result) = pool
            .run(task, TaskContext::new("p", Arc::new(ResultBoard::new())))
            .await;
        assert_eq!(result.agent_type.as_deref(), Some("summarizer"));
        assert!(result.duration_ms().unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_unbounded_spawn_ignores_capacity() {
        let (pool, monitor) = pool(1);
        let board = Arc::new(ResultBoard::new());
        let mut set = JoinSet::new();
        for i in 0..3 {
            let task = AgentTask::new(format!("t{i}"), "general", "process");
            pool.spawn_unbounded(&mut set, task, TaskContext::new("p", Arc::clone(&board)));
        }
        while let Some(joined) = set.join_next().await {
            assert!(joined.unwrap().1.is_completed());
        }
        assert_eq!(board.len(), 3);
        assert_eq!(monitor.peak_running().await, 3);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_executor() {
        let finished = Arc::new(AtomicBool::new(false));
        let pool = WorkerPool::new(
            1,
            Arc::new(Lingering(Arc::clone(&finished))),
            ExecutionMonitor::new(),
        );
        let board = Arc::new(ResultBoard::new());
        let task = AgentTask::new("slow", "general", "process");

        let run = pool.run(task, TaskContext::new("p", Arc::clone(&board)));
        assert!(tokio::time::timeout(Duration::from_millis(20), run)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(board.get("slow").is_none());
        assert_eq!(pool.available(), 1);
    }
}
