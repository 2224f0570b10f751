//! One-shot result holder for a task.

use super::panic_handler::PanicHandler;
use crate::error::TaskError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Outcome<T> = Result<T, TaskError>;

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

struct FutureState<T> {
    outcome: Option<Arc<Outcome<T>>>,
    callbacks: Vec<Callback<T>>,
    // set once the callbacks queued before resolution have all fired
    settled: bool,
}

/// Resolved exactly once with either a value or a [`TaskError`]; readable any
/// number of times afterwards.
///
/// Completion callbacks fire once each, in registration order, on the thread
/// that resolves the future, or immediately on the registering thread when
/// the future is already resolved. A panicking callback is logged and does
/// not prevent the remaining callbacks from running. [`wait`](Self::wait)
/// returns only after the callbacks registered before resolution have run.
pub struct TaskFuture<T> {
    state: Mutex<FutureState<T>>,
    done: Condvar,
    panics: Arc<PanicHandler>,
}

impl<T: Send + Sync + 'static> TaskFuture<T> {
    pub(crate) fn new(panics: Arc<PanicHandler>) -> Self {
        Self {
            state: Mutex::new(FutureState {
                outcome: None,
                callbacks: Vec::new(),
                settled: false,
            }),
            done: Condvar::new(),
            panics,
        }
    }

    /// Records the outcome and fires callbacks. Returns `false` without
    /// touching anything if the future was already resolved.
    pub(crate) fn resolve(&self, outcome: Outcome<T>) -> bool {
        let (outcome, callbacks) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                tracing::error!("attempted to resolve a task future twice");
                return false;
            }
            let outcome = Arc::new(outcome);
            state.outcome = Some(outcome.clone());
            (outcome, std::mem::take(&mut state.callbacks))
        };

        for callback in callbacks {
            self.fire(callback, &outcome);
        }

        self.state.lock().settled = true;
        self.done.notify_all();
        true
    }

    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let resolved = {
            let mut state = self.state.lock();
            match &state.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        self.fire(Box::new(callback), &resolved);
    }

    fn fire(&self, callback: Callback<T>, outcome: &Outcome<T>) {
        if let Err(info) = self.panics.execute(|| callback(outcome)) {
            tracing::error!(panic = %info.message, "completion callback panicked");
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// Blocks until resolved and settled. `None` waits forever. Returns
    /// whether that happened before the deadline.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.state.lock();
        match timeout {
            None => {
                while !state.settled {
                    self.done.wait(&mut state);
                }
                true
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !state.settled {
                    if self.done.wait_until(&mut state, deadline).timed_out() {
                        return state.settled;
                    }
                }
                true
            }
        }
    }

    pub fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.state.lock().outcome.clone()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.outcome()
            .and_then(|outcome| (*outcome).as_ref().err().cloned())
    }

    pub fn result(&self) -> Option<T>
    where
        T: Clone,
    {
        self.outcome()
            .and_then(|outcome| (*outcome).as_ref().ok().cloned())
    }
}

impl<T> std::fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskFuture")
            .field("resolved", &state.outcome.is_some())
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}
