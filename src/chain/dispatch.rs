//! Completion dispatcher.
//!
//! Chained tasks report their outcome over a channel instead of touching
//! chain state from worker threads. A single dispatcher thread consumes the
//! reports and records failures into the chain's and the runtime's error
//! cells.

use crate::error::{Error, LastError, Result, TaskError};
use crate::executor::TaskId;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outcome report for one chained task.
#[derive(Debug)]
pub(crate) struct Completion {
    pub task: TaskId,
    pub failure: Option<TaskError>,
    /// The chain's own error cell.
    pub errors: LastError,
}

#[derive(Debug)]
pub(crate) enum Message {
    Completed(Completion),
    /// Acknowledged once every earlier message has been handled.
    Flush(Sender<()>),
}

/// Cloneable sending side held by chains.
#[derive(Debug, Clone)]
pub(crate) struct DispatchSender {
    tx: Sender<Message>,
}

impl DispatchSender {
    pub fn send(&self, completion: Completion) {
        if self.tx.send(Message::Completed(completion)).is_err() {
            tracing::debug!("dispatcher gone, completion dropped");
        }
    }

    /// Waits until everything sent before this call has been processed.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(Message::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

/// Owns the dispatcher thread. Dropping it stops the thread.
pub(crate) struct Dispatcher {
    sender: DispatchSender,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// `global` receives every recorded failure on top of the chain's own
    /// cell.
    pub fn spawn(global: LastError) -> Result<Self> {
        let (tx, rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("autochain-dispatch".to_string())
            .spawn(move || run(rx, shutdown_rx, global))
            .map_err(|e| Error::executor(format!("spawn dispatcher failed: {}", e)))?;

        Ok(Self {
            sender: DispatchSender { tx },
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // disconnecting the shutdown channel wakes the select below
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("dispatcher thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

fn run(rx: Receiver<Message>, shutdown: Receiver<()>, global: LastError) {
    tracing::debug!("dispatcher started");

    loop {
        select! {
            recv(rx) -> msg => match msg {
                Ok(Message::Completed(completion)) => handle(completion, &global),
                Ok(Message::Flush(ack)) => {
                    let _ = ack.send(());
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }

    tracing::debug!("dispatcher exiting");
}

fn handle(completion: Completion, global: &LastError) {
    let Completion {
        task,
        failure,
        errors,
    } = completion;

    match failure {
        // cancellation is an outcome, not an error worth reporting
        None => {}
        Some(err) if err.is_cancelled() => {}
        Some(err) => {
            let message = err.to_string();
            tracing::warn!(task_id = %task, error = %message, "chained task failed");
            errors.record(message.clone());
            global.record(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::executor::TaskExecutor;

    fn task_id() -> TaskId {
        let config = Config::builder().num_workers(1).build().unwrap();
        let executor = TaskExecutor::new(config).unwrap();
        executor.submit(|| Ok::<_, TaskError>(())).id()
    }

    #[test]
    fn test_failure_recorded_in_both_cells() {
        let global = LastError::new();
        let dispatcher = Dispatcher::spawn(global.clone()).unwrap();
        let sender = dispatcher.sender();
        let chain_errors = LastError::new();

        sender.send(Completion {
            task: task_id(),
            failure: Some(TaskError::failed("template missing")),
            errors: chain_errors.clone(),
        });
        assert!(sender.flush(Duration::from_secs(1)));

        assert_eq!(chain_errors.get().as_deref(), Some("template missing"));
        assert_eq!(global.get().as_deref(), Some("template missing"));
    }

    #[test]
    fn test_success_and_cancellation_are_not_recorded() {
        let global = LastError::new();
        let dispatcher = Dispatcher::spawn(global.clone()).unwrap();
        let sender = dispatcher.sender();
        let errors = LastError::new();

        for failure in [None, Some(TaskError::Cancelled)] {
            sender.send(Completion {
                task: task_id(),
                failure,
                errors: errors.clone(),
            });
        }
        assert!(sender.flush(Duration::from_secs(1)));

        assert_eq!(errors.get(), None);
        assert_eq!(global.get(), None);
    }

    #[test]
    fn test_flush_fails_after_drop() {
        let dispatcher = Dispatcher::spawn(LastError::new()).unwrap();
        let sender = dispatcher.sender();
        drop(dispatcher);
        assert!(!sender.flush(Duration::from_millis(50)));
    }
}
