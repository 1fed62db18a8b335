//! Bounded fan-out for blocking reconciliation work.
//!
//! A [`BatchExecutor`] holds a fixed number of worker permits. Each
//! [`Batch`] collects tasks submitted by one phase; `wait_for_all` is the
//! barrier between phases. Every task runs to completion even when a sibling
//! fails, and every failure is reported.

use crate::error::{DeployError, Result, TaskFailure};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_WORKERS: usize = 20;

pub struct BatchExecutor {
    // Kept alive for the executor's lifetime when no ambient runtime exists.
    _runtime: Option<Runtime>,
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl BatchExecutor {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(DeployError::Executor(
                "worker count must be greater than zero".to_string(),
            ));
        }
        let (runtime, handle) = match Handle::try_current() {
            Ok(handle) => (None, handle),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .max_blocking_threads(workers)
                    .thread_name("stratum-worker")
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        DeployError::Executor(format!("failed to create tokio runtime: {e}"))
                    })?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };
        Ok(Self {
            _runtime: runtime,
            handle,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start a new, empty batch labelled `label` for error reporting.
    pub fn batch<T: Send + 'static>(&self, label: impl Into<String>) -> Batch<'_, T> {
        Batch {
            executor: self,
            label: label.into(),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(_) => tokio::task::block_in_place(|| self.handle.block_on(future)),
            Err(_) => self.handle.block_on(future),
        }
    }
}

type TaskOutput<T> = (String, Result<T>);

/// The tasks of one phase.
pub struct Batch<'a, T> {
    executor: &'a BatchExecutor,
    label: String,
    tasks: JoinSet<TaskOutput<T>>,
    submitted: usize,
}

impl<T: Send + 'static> Batch<'_, T> {
    /// Queue `work` to run on a worker once a permit is free.
    pub fn submit<F>(&mut self, task: impl Into<String>, work: F)
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = task.into();
        let permits = Arc::clone(&self.executor.permits);
        tracing::debug!(batch = %self.label, task = %task, "submit");
        self.submitted += 1;
        self.tasks.spawn_on(
            async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        return (task, Err(DeployError::Executor("worker pool closed".into())))
                    }
                };
                let result = match tokio::task::spawn_blocking(work).await {
                    Ok(result) => result,
                    Err(e) => Err(DeployError::Executor(format!("task panicked: {e}"))),
                };
                (task, result)
            },
            &self.executor.handle,
        );
    }

    pub fn len(&self) -> usize {
        self.submitted
    }

    pub fn is_empty(&self) -> bool {
        self.submitted == 0
    }

    /// Wait for every task, then return their outputs ordered by task name,
    /// or a [`DeployError::Batch`] naming every task that failed.
    pub fn wait_for_all(self) -> Result<Vec<(String, T)>> {
        let Batch {
            executor,
            label,
            mut tasks,
            submitted,
        } = self;
        let started = Instant::now();

        let joined = executor.block_on(async move {
            let mut joined = Vec::with_capacity(submitted);
            while let Some(next) = tasks.join_next().await {
                joined.push(next);
            }
            joined
        });

        let mut outputs = Vec::with_capacity(submitted);
        let mut failures = Vec::new();
        for next in joined {
            match next {
                Ok((task, Ok(value))) => outputs.push((task, value)),
                Ok((task, Err(error))) => {
                    tracing::error!(batch = %label, task = %task, error = %error, "task failed");
                    failures.push(TaskFailure { task, error });
                }
                Err(e) => failures.push(TaskFailure {
                    task: "<unknown>".to_string(),
                    error: DeployError::Executor(format!("task join error: {e}")),
                }),
            }
        }

        tracing::debug!(
            batch = %label,
            tasks = submitted,
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );

        if !failures.is_empty() {
            failures.sort_by(|a, b| a.task.cmp(&b.task));
            return Err(DeployError::Batch {
                batch: label,
                failures,
            });
        }
        outputs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(outputs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_workers_is_rejected() {
        assert!(BatchExecutor::new(0).is_err());
    }

    #[test]
    fn outputs_sorted_by_task_name() {
        let executor = BatchExecutor::new(4).unwrap();
        let mut batch = executor.batch("names");
        for name in ["gamma", "alpha", "beta"] {
            batch.submit(name, move || Ok(name.len()));
        }
        assert_eq!(batch.len(), 3);
        let out = batch.wait_for_all().unwrap();
        let names: Vec<&str> = out.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn concurrency_is_bounded() {
        let executor = BatchExecutor::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut batch = executor.batch("bounded");
        for i in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            batch.submit(format!("task-{i}"), move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        batch.wait_for_all().unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn failure_is_reported_and_siblings_finish() {
        let executor = BatchExecutor::new(3).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let mut batch = executor.batch("tenant-config");
        for i in 0..6 {
            let finished = Arc::clone(&finished);
            batch.submit(format!("tenant-{i}"), move || {
                std::thread::sleep(Duration::from_millis(10));
                if i == 2 {
                    return Err(DeployError::provider("save-config", "tenant-2", "denied"));
                }
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let err = batch.wait_for_all().unwrap_err();
        assert_eq!(finished.load(Ordering::SeqCst), 5);
        match err {
            DeployError::Batch { batch, failures } => {
                assert_eq!(batch, "tenant-config");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].task, "tenant-2");
            }
            other => panic!("expected batch error, got {other}"),
        }
    }

    #[test]
    fn every_failure_is_kept() {
        let executor = BatchExecutor::new(2).unwrap();
        let mut batch = executor.batch("all-fail");
        for i in 0..3 {
            batch.submit(format!("t{i}"), move || -> Result<()> {
                Err(DeployError::MissingParameter(format!("p{i}")))
            });
        }
        let err = batch.wait_for_all().unwrap_err();
        assert!(err.to_string().contains("3 task(s) failed"), "{err}");
        assert!(err.is_config_error());
    }

    #[test]
    fn panic_counts_as_failure() {
        let executor = BatchExecutor::new(2).unwrap();
        let mut batch = executor.batch("panics");
        batch.submit("ok", || Ok(1));
        batch.submit("boom", || -> Result<i32> { panic!("provider exploded") });
        let err = batch.wait_for_all().unwrap_err();
        assert!(err.to_string().contains("[boom]"), "{err}");
    }

    #[test]
    fn empty_batch_completes() {
        let executor = BatchExecutor::new(1).unwrap();
        let batch: Batch<'_, ()> = executor.batch("empty");
        assert!(batch.is_empty());
        assert!(batch.wait_for_all().unwrap().is_empty());
    }

    #[test]
    fn sequential_batches_reuse_workers() {
        let executor = BatchExecutor::new(1).unwrap();
        for round in 0..3 {
            let mut batch = executor.batch(format!("round-{round}"));
            batch.submit("only", move || Ok(round));
            assert_eq!(batch.wait_for_all().unwrap()[0].1, round);
        }
    }
}
