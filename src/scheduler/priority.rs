use crate::error::{Error, Result};
use crate::executor::task::{Task, TaskId};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

/// Scheduling rank, 1 (highest) to 10 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(5);
    pub const LOWEST: Priority = Priority(10);

    pub fn new(value: u8) -> Result<Self> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Priority(value))
        } else {
            Err(Error::InvalidPriority(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl TryFrom<u8> for Priority {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Heap entry. Ordered so that `BinaryHeap` (a max-heap) yields the smallest
/// `(priority, sequence)` first.
struct PriorityTask {
    priority: Priority,
    sequence: u64,
    task: Task,
}

impl PriorityTask {
    fn new(task: Task) -> Self {
        Self {
            priority: task.priority(),
            sequence: task.sequence(),
            task,
        }
    }
}

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        let priority_cmp = other.priority.cmp(&self.priority);
        if priority_cmp != CmpOrdering::Equal {
            return priority_cmp;
        }

        other.sequence.cmp(&self.sequence)
    }
}

/// Blocking priority queue shared by all workers of one executor.
pub(crate) struct PriorityQueue {
    heap: Mutex<BinaryHeap<PriorityTask>>,
    available: Condvar,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, task: Task) {
        self.heap.lock().push(PriorityTask::new(task));
        self.available.notify_one();
    }

    /// Waits up to `timeout` for a task. `None` on timeout.
    pub fn pop(&self, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now() + timeout;
        let mut heap = self.heap.lock();

        loop {
            if let Some(entry) = heap.pop() {
                return Some(entry.task);
            }
            if self.available.wait_until(&mut heap, deadline).timed_out() {
                return heap.pop().map(|entry| entry.task);
            }
        }
    }

    #[cfg(test)]
    pub fn try_pop(&self) -> Option<Task> {
        self.heap.lock().pop().map(|entry| entry.task)
    }

    /// Removes the queued task with `id`, if it is still queued.
    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut heap = self.heap.lock();
        let mut entries = std::mem::take(&mut *heap).into_vec();
        let removed = entries
            .iter()
            .position(|entry| entry.task.id() == id)
            .map(|pos| entries.swap_remove(pos).task);
        *heap = BinaryHeap::from(entries);
        removed
    }

    /// Re-keys a queued task. The original sequence is kept for tie-breaks.
    pub fn reprioritize(&self, id: TaskId, priority: Priority) -> bool {
        let mut heap = self.heap.lock();
        let mut entries = std::mem::take(&mut *heap).into_vec();
        let found = match entries.iter_mut().find(|entry| entry.task.id() == id) {
            Some(entry) => {
                entry.task.set_priority(priority);
                entry.priority = priority;
                true
            }
            None => false,
        };
        *heap = BinaryHeap::from(entries);
        found
    }

    pub fn drain(&self) -> Vec<Task> {
        let mut heap = self.heap.lock();
        std::mem::take(&mut *heap)
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.task)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Wakes every blocked `pop` so callers can re-check their flags.
    pub fn wake_all(&self) {
        self.available.notify_all();
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
