//! Task execution infrastructure.
//!
//! A [`TaskExecutor`] owns one priority queue and a fixed pool of worker
//! threads. Submitting returns a [`TaskHandle`] whose one-shot future is
//! resolved by whichever worker runs the task.

pub mod future;
pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use future::{Outcome, TaskFuture};
pub use panic_handler::{PanicHandler, PanicInfo};
pub use pool::{ExecutorStats, TaskExecutor};
pub use task::{TaskHandle, TaskId, TaskStatus};
