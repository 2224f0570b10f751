//! Strict synchronous sequences.
//!
//! A sequence runs its steps one after another on the calling thread,
//! bypassing the priority queue. The first step that returns `false`, fails
//! or panics ends the sequence, and the remaining steps never run.

use crate::chain::Chain;
use crate::device::{Point, Rect, Screenshot};
use crate::error::{LastError, TaskError};
use crate::executor::{PanicHandler, TaskHandle};
use std::time::{Duration, Instant};

/// One step of a strict sequence. `Ok(false)` and `Err(_)` both stop it.
pub type Step = Box<dyn FnOnce() -> Result<bool, TaskError>>;

/// Runs `steps` in order. Returns `true` only if every step returned
/// `Ok(true)`.
///
/// `timeout` is checked before each step; a step already running is never
/// interrupted. The reason a sequence stopped is written to `errors`.
pub fn strict_sequence<I>(steps: I, timeout: Option<Duration>, errors: &LastError) -> bool
where
    I: IntoIterator<Item = Step>,
{
    let start = Instant::now();
    let panics = PanicHandler::new();

    for (index, step) in steps.into_iter().enumerate() {
        let number = index + 1;

        if let Some(timeout) = timeout {
            if start.elapsed() > timeout {
                tracing::warn!(
                    step = number,
                    timeout_ms = timeout.as_millis() as u64,
                    "sequence timed out"
                );
                errors.record("sequence timed out");
                return false;
            }
        }

        let message = match panics.execute(step) {
            Ok(Ok(true)) => continue,
            Ok(Ok(false)) => format!("step {} returned false", number),
            Ok(Err(err)) => format!("step {} failed: {}", number, err),
            Err(info) => format!("step {} panicked: {}", number, info.message),
        };

        tracing::warn!(step = number, reason = %message, "sequence stopped");
        errors.record(message);
        return false;
    }

    true
}

/// Wraps `func` into a [`Step`], normalising whatever it returns through
/// [`StepOutput`]. Handles and chains are waited on for at most
/// `step_wait`.
pub fn create_task<F, R>(func: F, step_wait: Duration) -> Step
where
    F: FnOnce() -> R + 'static,
    R: StepOutput,
{
    Box::new(move || func().into_step_result(step_wait))
}

/// Anything a step function may return.
pub trait StepOutput {
    fn into_step_result(self, step_wait: Duration) -> Result<bool, TaskError>;
}

impl StepOutput for bool {
    fn into_step_result(self, _: Duration) -> Result<bool, TaskError> {
        Ok(self)
    }
}

impl StepOutput for () {
    fn into_step_result(self, _: Duration) -> Result<bool, TaskError> {
        Ok(true)
    }
}

impl<R, E> StepOutput for Result<R, E>
where
    R: StepOutput,
    E: Into<TaskError>,
{
    fn into_step_result(self, step_wait: Duration) -> Result<bool, TaskError> {
        match self {
            Ok(output) => output.into_step_result(step_wait),
            Err(err) => Err(err.into()),
        }
    }
}

impl<T> StepOutput for TaskHandle<T>
where
    T: StepValue + Send + Sync + 'static,
{
    fn into_step_result(self, step_wait: Duration) -> Result<bool, TaskError> {
        if !self.wait(Some(step_wait)) {
            return Err(TaskError::TimedOut(step_wait));
        }
        match self.outcome() {
            Some(outcome) => match &*outcome {
                Ok(value) => Ok(value.succeeded()),
                Err(err) => Err(err.clone()),
            },
            None => Err(TaskError::TimedOut(step_wait)),
        }
    }
}

impl<T> StepOutput for Chain<T>
where
    T: StepValue + Send + Sync + 'static,
{
    fn into_step_result(self, step_wait: Duration) -> Result<bool, TaskError> {
        match self.handle() {
            Some(handle) => handle.clone().into_step_result(step_wait),
            None => Ok(true),
        }
    }
}

/// How a task's successful value reads as a step verdict.
pub trait StepValue {
    fn succeeded(&self) -> bool {
        true
    }
}

impl StepValue for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

/// `None` counts as a miss, so "element present" checks can gate a sequence.
impl<T> StepValue for Option<T> {
    fn succeeded(&self) -> bool {
        self.is_some()
    }
}

macro_rules! always_succeeds {
    ($($ty:ty),* $(,)?) => {
        $(impl StepValue for $ty {})*
    };
}

always_succeeds!(
    (),
    Point,
    Rect,
    Screenshot,
    String,
    &'static str,
    i32,
    i64,
    u32,
    u64,
    usize,
);
