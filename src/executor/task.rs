//! Task representation and execution.

use super::future::{Outcome, TaskFuture};
use super::panic_handler::PanicHandler;
use crate::error::TaskError;
use crate::scheduler::Priority;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Submission counter used only to break priority ties.
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// State shared between the queued task and every handle to it.
pub(crate) struct TaskCore {
    id: TaskId,
    priority: AtomicU8,
    status: Mutex<TaskStatus>,
    created_at: Instant,
}

impl TaskCore {
    fn new(priority: Priority) -> Self {
        Self {
            id: TaskId::next(),
            priority: AtomicU8::new(priority.get()),
            status: Mutex::new(TaskStatus::Pending),
            created_at: Instant::now(),
        }
    }

    pub fn priority(&self) -> Priority {
        // Only ever stores values that came from a valid `Priority`.
        Priority::new(self.priority.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    /// Moves `from -> to`. Fails if the task is not currently in `from`.
    pub fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        let mut status = self.status.lock();
        if *status != from {
            return false;
        }
        *status = to;
        true
    }
}

/// The deferred operation plus the future it resolves, with its result type
/// erased so tasks of any output type share one queue.
trait Runnable: Send {
    fn run(self: Box<Self>, core: &TaskCore) -> Result<(), TaskError>;
    fn cancel(self: Box<Self>, core: &TaskCore);
}

struct Job<F, T> {
    func: F,
    future: Arc<TaskFuture<T>>,
    panics: Arc<PanicHandler>,
}

impl<F, T> Runnable for Job<F, T>
where
    F: FnOnce() -> Outcome<T> + Send + 'static,
    T: Send + Sync + 'static,
{
    fn run(self: Box<Self>, core: &TaskCore) -> Result<(), TaskError> {
        let Job {
            func,
            future,
            panics,
        } = *self;

        let outcome = match panics.execute(func) {
            Ok(outcome) => outcome,
            Err(info) => Err(info.into()),
        };
        let failure = outcome.as_ref().err().cloned();

        let terminal = if failure.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Succeeded
        };
        core.transition(TaskStatus::Running, terminal);
        future.resolve(outcome);

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn cancel(self: Box<Self>, core: &TaskCore) {
        if core.transition(TaskStatus::Pending, TaskStatus::Cancelled) {
            self.future.resolve(Err(TaskError::Cancelled));
        }
    }
}

/// Internal task representation, owned by the queue until a worker takes it.
pub(crate) struct Task {
    core: Arc<TaskCore>,
    sequence: u64,
    job: Box<dyn Runnable>,
}

impl Task {
    /// Builds a pending task and the handle the submitter keeps.
    #[cfg(test)]
    pub fn new<F, T>(func: F, priority: Priority) -> (Self, TaskHandle<T>)
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        Self::with_panic_handler(func, priority, Arc::new(PanicHandler::new()))
    }

    pub fn with_panic_handler<F, T>(
        func: F,
        priority: Priority,
        panics: Arc<PanicHandler>,
    ) -> (Self, TaskHandle<T>)
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let core = Arc::new(TaskCore::new(priority));
        let future = Arc::new(TaskFuture::new(panics.clone()));
        let handle = TaskHandle {
            core: core.clone(),
            future: future.clone(),
        };
        let task = Task {
            core,
            sequence: SEQUENCE_COUNTER.fetch_add(1, Ordering::Relaxed),
            job: Box::new(Job {
                func,
                future,
                panics,
            }),
        };
        (task, handle)
    }

    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn priority(&self) -> Priority {
        self.core.priority()
    }

    pub fn set_priority(&self, priority: Priority) {
        self.core.priority.store(priority.get(), Ordering::Release);
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn queued_for(&self) -> Duration {
        self.core.created_at.elapsed()
    }

    /// Marks the task running and executes it. Returns `None` if the task
    /// was no longer pending.
    pub fn execute(self) -> Option<Result<(), TaskError>> {
        if !self.core.transition(TaskStatus::Pending, TaskStatus::Running) {
            return None;
        }
        Some(self.job.run(&self.core))
    }

    /// Resolves the future with [`TaskError::Cancelled`] without running.
    pub fn cancel(self) {
        self.job.cancel(&self.core);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.core.id)
            .field("priority", &self.core.priority())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Caller-side reference to a submitted task.
pub struct TaskHandle<T> {
    core: Arc<TaskCore>,
    future: Arc<TaskFuture<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            future: self.future.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn priority(&self) -> Priority {
        self.core.priority()
    }

    pub fn status(&self) -> TaskStatus {
        self.core.status()
    }

    pub fn is_done(&self) -> bool {
        self.future.is_done()
    }

    /// Blocks until the task resolves or `timeout` elapses. Never fails;
    /// returns whether the task resolved in time.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.future.wait(timeout)
    }

    pub fn result(&self) -> Option<T>
    where
        T: Clone,
    {
        self.future.result()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.future.error()
    }

    pub fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.future.outcome()
    }

    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.future.on_complete(callback);
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("status", &self.core.status())
            .finish()
    }
}
