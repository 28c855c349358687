//! Worker pool for trade plan tasks
//!
//! Balance checks and sub-loop runs are submitted as boxed futures and
//! executed on tokio tasks, at most `concurrency` at a time across every
//! plan sharing the pool. A group runs its tasks concurrently and collects
//! every result; a chain runs them one at a time in submission order.
//! A task that panics or is aborted is reported as `TaskError::WorkerAborted`.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use crate::domain::errors::TaskError;

pub type TaskResult = Result<bool, TaskError>;

/// A named unit of work.
pub struct WorkerTask {
    pub name: String,
    future: BoxFuture<'static, TaskResult>,
}

impl WorkerTask {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: future.boxed(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task concurrently and wait for all of them. Results are in
    /// submission order; a failing task never cancels its siblings.
    pub async fn run_group(&self, tasks: Vec<WorkerTask>) -> Vec<TaskResult> {
        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let handles: Vec<JoinHandle<TaskResult>> =
            tasks.into_iter().map(|task| self.spawn(task)).collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| flatten(&name, joined))
            .collect()
    }

    /// Run tasks one after another. Every task runs regardless of the
    /// outcome of the previous one.
    pub async fn run_chain(&self, tasks: Vec<WorkerTask>) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            let name = task.name.clone();
            let joined = self.spawn(task).await;
            results.push(flatten(&name, joined));
        }
        results
    }

    fn spawn(&self, task: WorkerTask) -> JoinHandle<TaskResult> {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| TaskError::WorkerAborted(e.to_string()))?;
            debug!("Worker task '{}' started", task.name);
            let result = task.future.await;
            debug!("Worker task '{}' finished: {:?}", task.name, result);
            result
        })
    }
}

fn flatten(name: &str, joined: Result<TaskResult, JoinError>) -> TaskResult {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!("Worker task '{}' did not complete: {}", name, e);
            Err(TaskError::WorkerAborted(format!("{}: {}", name, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_group_collects_every_result() {
        let pool = WorkerPool::new(4);
        let results = pool
            .run_group(vec![
                WorkerTask::new("ok", async { Ok(true) }),
                WorkerTask::new("failed", async { Ok(false) }),
                WorkerTask::new("slow", async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(true)
                }),
            ])
            .await;

        assert_eq!(results, vec![Ok(true), Ok(false), Ok(true)]);
    }

    #[tokio::test]
    async fn test_group_respects_concurrency_bound() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                WorkerTask::new(format!("task-{}", i), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(true)
                })
            })
            .collect();

        let results = pool.run_group(tasks).await;
        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_and_does_not_halt() {
        let pool = WorkerPool::new(4);
        let order = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..3)
            .map(|i| {
                let order = order.clone();
                WorkerTask::new(format!("link-{}", i), async move {
                    tokio::time::sleep(Duration::from_millis(3 - i as u64)).await;
                    order.lock().await.push(i);
                    Ok(i != 0)
                })
            })
            .collect();

        let results = pool.run_chain(tasks).await;
        assert_eq!(results, vec![Ok(false), Ok(true), Ok(true)]);
        assert_eq!(*order.lock().await, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_as_aborted() {
        let pool = WorkerPool::new(2);
        let results = pool
            .run_group(vec![
                WorkerTask::new("boom", async {
                    if true {
                        panic!("worker exploded");
                    }
                    Ok(true)
                }),
                WorkerTask::new("fine", async { Ok(true) }),
            ])
            .await;

        assert!(matches!(results[0], Err(TaskError::WorkerAborted(_))));
        assert_eq!(results[1], Ok(true));
    }

    #[test]
    fn test_zero_concurrency_is_raised_to_one() {
        assert_eq!(WorkerPool::new(0).concurrency(), 1);
    }
}
