use crate::chain::dispatch::{Completion, Dispatcher};
use crate::chain::ops::{self, Collaborators};
use crate::chain::{Chain, ClickPos};
use crate::config::Config;
use crate::device::{Device, DeviceRegistry, OcrEngine, Rect, TemplateMatcher};
use crate::error::{LastError, Result};
use crate::executor::{ExecutorStats, Outcome, TaskExecutor, TaskHandle, TaskId};
use crate::runtime::Runtime;
use crate::scheduler::Priority;
use crate::sequence::{self, Step, StepOutput, StepValue};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Point-in-time view of an [`Automator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub running: bool,
    pub paused: bool,
    pub queue_depth: usize,
    pub worker_count: usize,
    pub last_error: Option<String>,
    pub active_device: Option<String>,
    pub devices: Vec<String>,
    pub stats: ExecutorStats,
}

/// Owns the executor, the device collaborators and the completion
/// dispatcher, and hands out [`Chain`]s and sequence steps bound to them.
///
/// ```no_run
/// use autochain::{Automator, Config};
/// use std::time::Duration;
///
/// let automator = Automator::builder()
///     .config(Config::builder().num_workers(2).build()?)
///     .build()?;
/// automator.start()?;
///
/// let chain = automator
///     .chain()
///     .add_wait_task(Duration::from_millis(50))
///     .then(|_| println!("waited"))
///     .wait(Some(Duration::from_secs(1)));
/// assert!(chain.exception().is_none());
/// # Ok::<(), autochain::Error>(())
/// ```
pub struct Automator {
    runtime: Arc<Runtime>,
    _dispatcher: Dispatcher,
}

impl Automator {
    pub fn builder() -> AutomatorBuilder {
        AutomatorBuilder::new()
    }

    pub fn new(config: Config) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &Config {
        self.runtime.config()
    }

    pub fn start(&self) -> Result<()> {
        self.runtime.executor.start()
    }

    /// Stops the workers. Queued tasks stay queued for a later `start`.
    pub fn stop(&self) {
        self.runtime.executor.stop();
    }

    pub fn pause(&self) {
        self.runtime.executor.pause();
    }

    pub fn resume(&self) {
        self.runtime.executor.resume();
    }

    pub fn is_running(&self) -> bool {
        self.runtime.executor.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.runtime.executor.is_paused()
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.runtime.collaborators.devices
    }

    pub fn add_device<S: Into<String>>(&self, uri: S, device: Arc<dyn Device>) -> Result<()> {
        self.devices().add(uri, device)
    }

    pub fn set_active_device(&self, uri: &str) -> Result<()> {
        self.devices().set_active(uri)
    }

    /// Submits `op` at the default priority. Failures are recorded in
    /// [`last_error`](Self::last_error).
    pub fn submit<F, T>(&self, op: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.enqueue(op, self.config().default_priority)
    }

    /// Like [`submit`](Self::submit) with an explicit priority. An out of
    /// range priority is rejected and nothing is enqueued.
    pub fn submit_with_priority<F, T>(&self, op: F, priority: u8) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let priority = Priority::new(priority)?;
        Ok(self.enqueue(op, priority))
    }

    fn enqueue<F, T>(&self, op: F, priority: Priority) -> TaskHandle<T>
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let handle = self.runtime.executor.submit_with_priority(op, priority);
        let id = handle.id();
        let dispatch = self.runtime.dispatch.clone();
        let errors = self.runtime.last_error.clone();
        handle.on_complete(move |outcome| {
            dispatch.send(Completion {
                task: id,
                failure: outcome.as_ref().err().cloned(),
                errors,
            });
        });
        handle
    }

    pub fn cancel_task(&self, id: TaskId) -> bool {
        self.runtime.executor.cancel_task(id)
    }

    /// Returns `Ok(false)` if the task is no longer queued.
    pub fn adjust_task_priority(&self, id: TaskId, priority: u8) -> Result<bool> {
        let priority = Priority::new(priority)?;
        Ok(self.runtime.executor.adjust_priority(id, priority))
    }

    pub fn queue_size(&self) -> usize {
        self.runtime.executor.queue_size()
    }

    pub fn worker_count(&self) -> usize {
        self.runtime.executor.worker_count()
    }

    pub fn stats(&self) -> ExecutorStats {
        self.runtime.executor.stats()
    }

    /// Starts a new, empty chain at the default priority.
    pub fn chain(&self) -> Chain<()> {
        Chain::new(self.runtime.clone())
    }

    /// Runs `steps` on the calling thread. See [`sequence::strict_sequence`].
    pub fn strict_sequence<I>(&self, steps: I, timeout: Option<Duration>) -> bool
    where
        I: IntoIterator<Item = Step>,
    {
        sequence::strict_sequence(steps, timeout, &self.runtime.last_error)
    }

    /// Adapts `func` into a sequence step bounded by the configured
    /// `step_wait_timeout`.
    pub fn create_task<F, R>(&self, func: F) -> Step
    where
        F: FnOnce() -> R + 'static,
        R: StepOutput,
    {
        sequence::create_task(func, self.config().step_wait_timeout)
    }

    /// Step that submits `op` at the default priority and blocks on its
    /// handle. Queued steps report only through the sequence verdict, never
    /// through the completion dispatcher.
    fn queued_step<F, T>(&self, op: F) -> Step
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: StepValue + Send + Sync + 'static,
    {
        let executor = self.runtime.executor.clone();
        let priority = self.config().default_priority;
        self.create_task(move || executor.submit_with_priority(op, priority))
    }

    pub fn create_click_task(
        &self,
        pos: impl Into<ClickPos>,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let pos = pos.into();
        let device = device.map(str::to_owned);
        self.queued_step(move || Ok(ops::click(&c, pos, delay, device.as_deref())?))
    }

    pub fn create_key_task(
        &self,
        key: &str,
        duration: Duration,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let key = key.to_owned();
        let device = device.map(str::to_owned);
        self.queued_step(move || {
            Ok(ops::key_press(&c, &key, duration, delay, device.as_deref())?)
        })
    }

    pub fn create_wait_task(&self, duration: Duration) -> Step {
        self.queued_step(move || Ok(ops::wait(duration)?))
    }

    pub fn create_screenshot_task(&self, delay: Duration, device: Option<&str>) -> Step {
        let c = self.runtime.collaborators.clone();
        let device = device.map(str::to_owned);
        self.queued_step(move || Ok(ops::screenshot(&c, delay, device.as_deref())?))
    }

    pub fn create_template_click_task(
        &self,
        template: &str,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let template = template.to_owned();
        let device = device.map(str::to_owned);
        self.queued_step(move || {
            Ok(ops::template_click(&c, &template, delay, device.as_deref())?)
        })
    }

    /// Step that succeeds only if `template` is currently on screen.
    pub fn create_check_element_task(
        &self,
        template: &str,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let template = template.to_owned();
        let device = device.map(str::to_owned);
        self.queued_step(move || {
            Ok(ops::check_element(&c, &template, delay, device.as_deref())?)
        })
    }

    pub fn create_text_click_task(
        &self,
        text: &str,
        lang: Option<&str>,
        roi: Option<Rect>,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let text = text.to_owned();
        let lang = lang.map(str::to_owned);
        let device = device.map(str::to_owned);
        self.queued_step(move || {
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

    /// Step that succeeds only if OCR finds `text`.
    pub fn create_find_text_task(
        &self,
        text: &str,
        lang: Option<&str>,
        roi: Option<Rect>,
        delay: Duration,
        device: Option<&str>,
    ) -> Step {
        let c = self.runtime.collaborators.clone();
        let text = text.to_owned();
        let lang = lang.map(str::to_owned);
        let device = device.map(str::to_owned);
        self.queued_step(move || {
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

    /// Step that submits `op` through the queue and waits for it.
    pub fn create_custom_task<F, T>(&self, op: F) -> Step
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
        T: StepValue + Send + Sync + 'static,
    {
        self.queued_step(op)
    }

    pub fn last_error(&self) -> Option<String> {
        self.runtime.last_error.get()
    }

    pub fn clear_last_error(&self) {
        self.runtime.last_error.clear();
    }

    pub fn status(&self) -> Status {
        let executor = &self.runtime.executor;
        let devices = self.devices();
        Status {
            running: executor.is_running(),
            paused: executor.is_paused(),
            queue_depth: executor.queue_size(),
            worker_count: executor.worker_count(),
            last_error: self.last_error(),
            active_device: devices.active(),
            devices: devices.uris(),
            stats: executor.stats(),
        }
    }
}

impl Drop for Automator {
    fn drop(&mut self) {
        self.runtime.executor.stop();
    }
}

impl std::fmt::Debug for Automator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automator")
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[derive(Default)]
pub struct AutomatorBuilder {
    config: Config,
    devices: Vec<(String, Arc<dyn Device>)>,
    ocr: Option<Arc<dyn OcrEngine>>,
    matcher: Option<Arc<dyn TemplateMatcher>>,
}

impl AutomatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Registers a device; the first one becomes active.
    pub fn device<S: Into<String>>(mut self, uri: S, device: Arc<dyn Device>) -> Self {
        self.devices.push((uri.into(), device));
        self
    }

    pub fn ocr_engine(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn template_matcher(mut self, matcher: Arc<dyn TemplateMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Validates the config and connects every registered device. Workers
    /// are not started.
    pub fn build(self) -> Result<Automator> {
        let executor = Arc::new(TaskExecutor::new(self.config.clone())?);

        let devices = Arc::new(DeviceRegistry::new());
        for (uri, device) in self.devices {
            devices.add(uri, device)?;
        }

        let last_error = LastError::new();
        let dispatcher = Dispatcher::spawn(last_error.clone())?;

        let runtime = Arc::new(Runtime {
            executor,
            collaborators: Collaborators {
                devices,
                ocr: self.ocr,
                matcher: self.matcher,
            },
            dispatch: dispatcher.sender(),
            last_error,
            config: self.config,
        });

        tracing::debug!(workers = runtime.config.worker_threads(), "automator built");
        Ok(Automator {
            runtime,
            _dispatcher: dispatcher,
        })
    }
}

impl std::fmt::Debug for AutomatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomatorBuilder")
            .field("config", &self.config)
            .field("devices", &self.devices.iter().map(|(uri, _)| uri).collect::<Vec<_>>())
            .field("ocr", &self.ocr.is_some())
            .field("matcher", &self.matcher.is_some())
            .finish()
    }
}
