// worker thread loop
use super::pool::Shared;
use super::task::Task;
use crate::error::TaskError;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type WorkerId = usize;

pub(crate) struct Worker {
    pub id: WorkerId,
    generation: u64,
    shared: Arc<Shared>,
    pause_poll: Duration,
    pop_timeout: Duration,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        generation: u64,
        shared: Arc<Shared>,
        pause_poll: Duration,
        pop_timeout: Duration,
    ) -> Self {
        Self {
            id,
            generation,
            shared,
            pause_poll,
            pop_timeout,
        }
    }

    // main loop; `_exited` disconnects when this returns so `stop` can
    // tell a finished worker from a stuck one
    pub fn run(self, _exited: Sender<()>) {
        tracing::debug!(worker = self.id, "worker started");

        while self.shared.is_current(self.generation) {
            if self.shared.wait_while_paused(self.pause_poll) {
                continue;
            }

            let task = match self.shared.queue.pop(self.pop_timeout) {
                Some(task) => task,
                None => continue,
            };

            // Paused or stopped while blocked in `pop`: hand the task back
            // untouched. Its sequence is kept, so ordering is unchanged.
            if self.shared.is_paused() || !self.shared.is_current(self.generation) {
                self.shared.queue.push(task);
                continue;
            }

            self.execute_task(task);
        }

        tracing::debug!(worker = self.id, "worker exiting");
    }

    fn execute_task(&self, task: Task) {
        let task_id = task.id();
        let priority = task.priority();
        let waited = task.queued_for();
        let start = Instant::now();

        tracing::debug!(
            worker = self.id,
            %task_id,
            %priority,
            waited_ms = waited.as_millis() as u64,
            "task started"
        );

        let result = task.execute();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            None => {
                tracing::debug!(worker = self.id, %task_id, "task no longer pending, skipped");
            }
            Some(Ok(())) => {
                self.shared.stats.record_completed();
                tracing::debug!(worker = self.id, %task_id, elapsed_ms, "task succeeded");
            }
            Some(Err(TaskError::Panicked(message))) => {
                self.shared.stats.record_panicked();
                tracing::error!(worker = self.id, %task_id, elapsed_ms, panic = %message, "task panicked");
            }
            Some(Err(err)) => {
                self.shared.stats.record_failed();
                tracing::warn!(worker = self.id, %task_id, elapsed_ms, error = %err, "task failed");
            }
        }
    }
}
