//! Task ordering.
//!
//! Pending tasks wait in a single mutex-protected priority queue that always
//! yields the numerically smallest priority first and, among equal
//! priorities, the earliest submission.

pub mod priority;

pub use priority::Priority;

pub(crate) use priority::PriorityQueue;
