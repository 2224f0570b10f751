use super::future::Outcome;
use super::panic_handler::PanicHandler;
use super::task::{Task, TaskHandle, TaskId};
use super::worker::{Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler::{Priority, PriorityQueue};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Counters kept by the executor.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    cancelled: AtomicU64,
}

impl StatsCounters {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub completed: u64,
    /// Operations that returned an error. Panics are counted separately.
    pub failed: u64,
    pub panicked: u64,
    pub cancelled: u64,
}

/// State shared by the executor and its workers.
pub(crate) struct Shared {
    pub queue: PriorityQueue,
    pub stats: StatsCounters,
    running: AtomicBool,
    // bumped on every stop so workers abandoned by a previous stop retire
    // instead of joining a restarted pool
    generation: AtomicU64,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            stats: StatsCounters::default(),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            paused: Mutex::new(false),
            resumed: Condvar::new(),
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Sleeps up to `poll` if paused. Returns `true` if the caller was
    /// paused and should re-check its flags.
    pub fn wait_while_paused(&self, poll: Duration) -> bool {
        let mut paused = self.paused.lock();
        if !*paused {
            return false;
        }
        self.resumed.wait_for(&mut paused, poll);
        true
    }
}

struct WorkerHandle {
    id: WorkerId,
    thread: JoinHandle<()>,
    exited: Receiver<()>,
}

/// Priority-ordered task executor backed by a fixed pool of OS threads.
///
/// Tasks may be submitted before [`start`](Self::start); they wait in the
/// queue until workers exist.
pub struct TaskExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerHandle>>,
    panics: Arc<PanicHandler>,
    config: Config,
}

impl TaskExecutor {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared::new()),
            workers: Mutex::new(Vec::new()),
            panics: Arc::new(PanicHandler::new()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enqueues `op` at the configured default priority.
    pub fn submit<F, T>(&self, op: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.submit_with_priority(op, self.config.default_priority)
    }

    pub fn submit_with_priority<F, T>(&self, op: F, priority: Priority) -> TaskHandle<T>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let (task, handle) = Task::with_panic_handler(op, priority, self.panics.clone());
        tracing::debug!(task_id = %task.id(), %priority, "task submitted");

        self.shared.stats.record_submitted();
        self.shared.queue.push(task);
        handle
    }

    /// Spawns the worker pool. Does nothing if already running.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if self.shared.running.load(Ordering::Acquire) {
            tracing::warn!("executor already running");
            return Ok(());
        }

        let generation = self.shared.generation.load(Ordering::Acquire);
        self.shared.running.store(true, Ordering::Release);

        let num_workers = self.config.worker_threads();
        for id in 0..num_workers {
            match self.spawn_worker(id, generation) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    self.shared.running.store(false, Ordering::Release);
                    self.shared.generation.fetch_add(1, Ordering::AcqRel);
                    self.shared.queue.wake_all();
                    workers.clear();
                    return Err(err);
                }
            }
        }

        tracing::info!(workers = num_workers, "executor started");
        Ok(())
    }

    fn spawn_worker(&self, id: WorkerId, generation: u64) -> Result<WorkerHandle> {
        let (exited_tx, exited_rx) = bounded(1);
        let worker = Worker::new(
            id,
            generation,
            self.shared.clone(),
            self.config.pause_poll_interval,
            self.config.pop_timeout,
        );

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, id));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder
            .spawn(move || worker.run(exited_tx))
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

        Ok(WorkerHandle {
            id,
            thread,
            exited: exited_rx,
        })
    }

    /// Signals workers to exit after their current task and waits up to the
    /// configured grace period for each one.
    ///
    /// A worker still busy past its grace period is abandoned, not killed:
    /// its thread keeps running until the operation returns and then exits
    /// on its own. The thread and anything its operation holds stay alive
    /// until then.
    pub fn stop(&self) {
        let workers = {
            let mut workers = self.workers.lock();
            if !self.shared.running.swap(false, Ordering::AcqRel) {
                tracing::debug!("executor not running");
                return;
            }
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *workers)
        };

        tracing::info!("stopping executor");
        self.shared.resumed.notify_all();
        self.shared.queue.wake_all();

        let grace = self.config.stop_grace_period;
        for worker in workers {
            match worker.exited.recv_timeout(grace) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        worker = worker.id,
                        grace_ms = grace.as_millis() as u64,
                        "worker still busy after grace period, abandoning it"
                    );
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.thread.join().is_err() {
                        tracing::error!(worker = worker.id, "worker thread panicked");
                    }
                }
            }
        }

        tracing::info!("executor stopped");
    }

    /// Stops new tasks from starting. A task that is already running is
    /// not interrupted.
    pub fn pause(&self) {
        *self.shared.paused.lock() = true;
        tracing::info!("executor paused");
    }

    pub fn resume(&self) {
        *self.shared.paused.lock() = false;
        self.shared.resumed.notify_all();
        tracing::info!("executor resumed");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Cancels a task that is still waiting in the queue. Returns `false`
    /// if it already started, finished, or was never queued here.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        match self.shared.queue.remove(id) {
            Some(task) => {
                task.cancel();
                self.shared.stats.record_cancelled();
                tracing::debug!(task_id = %id, "task cancelled");
                true
            }
            None => {
                tracing::debug!(task_id = %id, "cancel ignored, task not queued");
                false
            }
        }
    }

    /// Re-keys a still-queued task. Returns `false` if it is no longer queued.
    pub fn adjust_priority(&self, id: TaskId, priority: Priority) -> bool {
        let adjusted = self.shared.queue.reprioritize(id, priority);
        if adjusted {
            tracing::debug!(task_id = %id, %priority, "task reprioritized");
        }
        adjusted
    }

    pub fn queue_size(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.shared.stats.snapshot()
    }

    /// Panics captured so far from operations and completion callbacks.
    pub fn panic_count(&self) -> u64 {
        self.panics.panic_count()
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.stop();

        // Nothing will ever run these; wake anyone waiting on them.
        for task in self.shared.queue.drain() {
            task.cancel();
            self.shared.stats.record_cancelled();
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("running", &self.is_running())
            .field("paused", &self.is_paused())
            .field("queue_size", &self.queue_size())
            .field("workers", &self.worker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::executor::task::TaskStatus;

    fn executor(workers: usize) -> TaskExecutor {
        let config = Config::builder()
            .num_workers(workers)
            .pause_poll_interval(Duration::from_millis(20))
            .pop_timeout(Duration::from_millis(20))
            .stop_grace_period(Duration::from_millis(500))
            .build()
            .unwrap();
        TaskExecutor::new(config).unwrap()
    }

    #[test]
    fn test_start_is_idempotent() {
        let exec = executor(3);
        assert_eq!(exec.worker_count(), 0);

        exec.start().unwrap();
        exec.start().unwrap();
        assert_eq!(exec.worker_count(), 3);
        assert!(exec.is_running());

        exec.stop();
        assert_eq!(exec.worker_count(), 0);
        assert!(!exec.is_running());

        // stop twice is harmless, restart spawns a fresh pool
        exec.stop();
        exec.start().unwrap();
        assert_eq!(exec.worker_count(), 3);
    }

    #[test]
    fn test_submit_before_start_runs_after_start() {
        let exec = executor(1);
        let handle = exec.submit(|| Ok::<_, TaskError>(21 * 2));
        assert_eq!(exec.queue_size(), 1);
        assert!(!handle.wait(Some(Duration::from_millis(50))));

        exec.start().unwrap();
        assert!(handle.wait(Some(Duration::from_secs(2))));
        assert_eq!(handle.result(), Some(42));
        assert_eq!(handle.status(), TaskStatus::Succeeded);
    }

    #[test]
    fn test_failures_do_not_kill_workers() {
        let exec = executor(1);
        exec.start().unwrap();

        let failing = exec.submit(|| Err::<(), _>(TaskError::failed("nope")));
        let panicking = exec.submit(|| -> Outcome<()> { panic!("worker must survive") });
        let fine = exec.submit(|| Ok::<_, TaskError>("still alive"));

        assert!(fine.wait(Some(Duration::from_secs(2))));
        assert_eq!(failing.error(), Some(TaskError::failed("nope")));
        assert!(matches!(panicking.error(), Some(TaskError::Panicked(_))));
        assert_eq!(fine.result(), Some("still alive"));

        // counters are bumped after the future resolves; joining settles them
        exec.stop();
        let stats = exec.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.panicked, 1);
    }

    #[test]
    fn test_cancel_and_adjust_unknown_task() {
        let exec = executor(1);
        let handle = exec.submit(|| Ok::<_, TaskError>(()));
        let id = handle.id();

        assert!(exec.cancel_task(id));
        assert!(!exec.cancel_task(id));
        assert!(!exec.adjust_priority(id, Priority::HIGHEST));
        assert_eq!(handle.status(), TaskStatus::Cancelled);
        assert_eq!(exec.stats().cancelled, 1);
    }

    #[test]
    fn test_drop_cancels_queued_tasks() {
        let exec = executor(1);
        let handle = exec.submit(|| Ok::<_, TaskError>(()));
        drop(exec);

        assert!(handle.wait(Some(Duration::from_millis(100))));
        assert_eq!(handle.error(), Some(TaskError::Cancelled));
    }
}
