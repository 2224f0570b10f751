//! Fluent chaining over the executor.
//!
//! A [`Chain`] is an owned value: every `add_*_task` call consumes it,
//! submits one task and returns a new chain whose current task is the one
//! just submitted. Continuations (`then`, `catch`, `wait`) apply to that
//! current task.
//!
//! Chaining a task while the previous one is still unresolved arms a gate:
//! if the previous task fails, the new one is cancelled from the resolving
//! worker before that worker dequeues anything else. The gate is best
//! effort. Cancellation only succeeds while the new task is still queued, so
//! once another worker has picked it up it runs regardless of the earlier
//! failure.

pub(crate) mod dispatch;
pub mod ops;

pub use ops::ClickPos;

use crate::device::{Point, Rect, Screenshot};
use crate::error::{LastError, TaskError};
use crate::executor::{Outcome, TaskHandle, TaskId, TaskStatus};
use crate::runtime::Runtime;
use crate::scheduler::Priority;
use dispatch::Completion;
use std::sync::Arc;
use std::time::Duration;

// bound for the dispatcher round-trip after a successful wait
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Chain<T> {
    runtime: Arc<Runtime>,
    current: Option<TaskHandle<T>>,
    priority: Priority,
    errors: LastError,
}

impl Chain<()> {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        let priority = runtime.config().default_priority;
        Self {
            runtime,
            current: None,
            priority,
            errors: LastError::new(),
        }
    }
}

impl<T: Send + Sync + 'static> Chain<T> {
    /// Priority for tasks added from here on.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Submits `op` as the chain's next task.
    pub fn add_custom_task<U, F>(self, op: F) -> Chain<U>
    where
        F: FnOnce() -> Outcome<U> + Send + 'static,
        U: Send + Sync + 'static,
    {
        let Chain {
            runtime,
            current,
            priority,
            errors,
        } = self;

        let handle = runtime.executor.submit_with_priority(op, priority);
        let id = handle.id();

        {
            let dispatch = runtime.dispatch.clone();
            let errors = errors.clone();
            handle.on_complete(move |outcome| {
                dispatch.send(Completion {
                    task: id,
                    failure: outcome.as_ref().err().cloned(),
                    errors,
                });
            });
        }

        if let Some(previous) = current.filter(|previous| !previous.is_done()) {
            let executor = Arc::downgrade(&runtime.executor);
            let previous_id = previous.id();
            previous.on_complete(move |outcome| {
                if outcome.is_ok() {
                    return;
                }
                let cancelled = executor
                    .upgrade()
                    .map_or(false, |executor| executor.cancel_task(id));
                tracing::debug!(
                    task_id = %previous_id,
                    dependent = %id,
                    cancelled,
                    "previous task failed, gating dependent"
                );
            });
            tracing::debug!(task_id = %id, previous = %previous_id, "chained behind pending task");
        }

        Chain {
            runtime,
            current: Some(handle),
            priority,
            errors,
        }
    }

    /// Clicks an absolute or relative position; yields the clicked point.
    pub fn add_click_task(
        self,
        pos: impl Into<ClickPos>,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<Point> {
        let c = self.runtime.collaborators.clone();
        let pos = pos.into();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || Ok(ops::click(&c, pos, delay, device.as_deref())?))
    }

    pub fn add_key_task(
        self,
        key: &str,
        duration: Duration,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<()> {
        let c = self.runtime.collaborators.clone();
        let key = key.to_owned();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || {
            Ok(ops::key_press(&c, &key, duration, delay, device.as_deref())?)
        })
    }

    pub fn add_text_input_task(
        self,
        text: &str,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<()> {
        let c = self.runtime.collaborators.clone();
        let text = text.to_owned();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || Ok(ops::text_input(&c, &text, delay, device.as_deref())?))
    }

    pub fn add_screenshot_task(self, delay: Duration, device: Option<&str>) -> Chain<Screenshot> {
        let c = self.runtime.collaborators.clone();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || Ok(ops::screenshot(&c, delay, device.as_deref())?))
    }

    /// Matches `template` on screen and clicks its centre. A miss fails the
    /// task.
    pub fn add_template_click_task(
        self,
        template: &str,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<Point> {
        let c = self.runtime.collaborators.clone();
        let template = template.to_owned();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || {
            Ok(ops::template_click(&c, &template, delay, device.as_deref())?)
        })
    }

    /// Looks for `template` without clicking. Absence is `Ok(None)`.
    pub fn add_check_element_task(
        self,
        template: &str,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<Option<Point>> {
        let c = self.runtime.collaborators.clone();
        let template = template.to_owned();
        let device = device.map(str::to_owned);
        self.add_custom_task(move || {
            Ok(ops::check_element(&c, &template, delay, device.as_deref())?)
        })
    }

    /// OCRs the screen (or `roi`) for `text` and clicks its centre. A miss
    /// fails the task.
    pub fn add_text_click_task(
        self,
        text: &str,
        lang: Option<&str>,
        roi: Option<Rect>,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<Point> {
        let c = self.runtime.collaborators.clone();
        let text = text.to_owned();
        let lang = lang.map(str::to_owned);
        let device = device.map(str::to_owned);
        self.add_custom_task(move || {
            Ok(ops::text_click(
                &c,
                &text,
                lang.as_deref(),
                roi,
                delay,
                device.as_deref(),
            )?)
        })
    }

    pub fn add_find_text_task(
        self,
        text: &str,
        lang: Option<&str>,
        roi: Option<Rect>,
        delay: Duration,
        device: Option<&str>,
    ) -> Chain<Option<Rect>> {
        let c = self.runtime.collaborators.clone();
        let text = text.to_owned();
        let lang = lang.map(str::to_owned);
        let device = device.map(str::to_owned);
        self.add_custom_task(move || {
            Ok(ops::find_text(
                &c,
                &text,
                lang.as_deref(),
                roi,
                delay,
                device.as_deref(),
            )?)
        })
    }

    /// Occupies a worker for `duration`.
    pub fn add_wait_task(self, duration: Duration) -> Chain<()> {
        self.add_custom_task(move || Ok(ops::wait(duration)?))
    }

    /// Runs `on_success` with the current task's value if it succeeds.
    /// A panic inside the handler is caught and logged.
    pub fn then<F>(self, on_success: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        match &self.current {
            Some(handle) => handle.on_complete(move |outcome| {
                if let Ok(value) = outcome {
                    on_success(value);
                }
            }),
            None => tracing::debug!("then on an empty chain ignored"),
        }
        self
    }

    /// Runs `on_error` with the current task's error if it fails,
    /// including by cancellation.
    pub fn catch<F>(self, on_error: F) -> Self
    where
        F: FnOnce(&TaskError) + Send + 'static,
    {
        match &self.current {
            Some(handle) => handle.on_complete(move |outcome| {
                if let Err(err) = outcome {
                    on_error(err);
                }
            }),
            None => tracing::debug!("catch on an empty chain ignored"),
        }
        self
    }

    /// Blocks until the current task resolves or `timeout` elapses. Never
    /// fails; inspect [`exception`](Self::exception) afterwards.
    pub fn wait(self, timeout: Option<Duration>) -> Self {
        if let Some(handle) = &self.current {
            if handle.wait(timeout) {
                // let the dispatcher catch up so last_error reflects this task
                self.runtime.dispatch.flush(FLUSH_TIMEOUT);
            } else {
                tracing::debug!(task_id = %handle.id(), "wait timed out");
            }
        }
        self
    }

    /// The current task's value, if it finished successfully.
    pub fn result(&self) -> Option<T>
    where
        T: Clone,
    {
        self.current.as_ref().and_then(TaskHandle::result)
    }

    /// The current task's error, if it finished unsuccessfully.
    pub fn exception(&self) -> Option<TaskError> {
        self.current.as_ref().and_then(TaskHandle::error)
    }

    pub fn is_done(&self) -> bool {
        self.current.as_ref().map_or(false, TaskHandle::is_done)
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.current.as_ref().map(TaskHandle::status)
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.current.as_ref().map(TaskHandle::id)
    }

    pub fn handle(&self) -> Option<&TaskHandle<T>> {
        self.current.as_ref()
    }

    /// Cancels the current task if it is still queued.
    pub fn cancel(&self) -> bool {
        self.task_id()
            .map_or(false, |id| self.runtime.executor.cancel_task(id))
    }

    /// Most recent failure among this chain's tasks. Cancellations are not
    /// recorded.
    pub fn last_error(&self) -> Option<String> {
        self.errors.get()
    }
}

impl<T> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("current", &self.current)
            .field("priority", &self.priority)
            .field("last_error", &self.errors.get())
            .finish()
    }
}
