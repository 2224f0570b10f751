//! AUTOCHAIN - prioritised, chainable task scheduling for game automation
//!
//! Device actions (clicks, key presses, screen captures, OCR and template
//! lookups) are queued as tasks on a fixed pool of worker threads, ordered by
//! priority and then by submission. A fluent [`Chain`] composes dependent
//! actions with `then` / `catch` / `wait`, and strict sequences run a list of
//! steps synchronously with first-failure and deadline semantics.
//!
//! # Quick Start
//!
//! ```no_run
//! use autochain::prelude::*;
//! use std::time::Duration;
//!
//! let automator = Automator::builder()
//!     .config(Config::builder().num_workers(1).build()?)
//!     .build()?;
//! automator.start()?;
//!
//! let handle = automator.submit(|| Ok::<_, TaskError>(6 * 7));
//! handle.wait(Some(Duration::from_secs(1)));
//! assert_eq!(handle.result(), Some(42));
//!
//! let ok = automator.strict_sequence(
//!     vec![
//!         automator.create_wait_task(Duration::from_millis(10)),
//!         automator.create_task(|| true),
//!     ],
//!     Some(Duration::from_secs(5)),
//! );
//! assert!(ok);
//! # Ok::<(), autochain::Error>(())
//! ```
//!
//! # Features
//!
//! - **Priority Queue**: 1 (highest) to 10 (lowest), FIFO among equals
//! - **Worker Pool**: fixed size, cooperative pause, bounded stop
//! - **Cancellation & Reprioritisation**: for tasks still queued
//! - **Chaining**: `then` / `catch` / `wait` with best-effort failure gating
//! - **Strict Sequences**: synchronous steps with an overall deadline

#![warn(missing_debug_implementations)]

pub mod automator;
pub mod chain;
pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod logging;
pub mod prelude;
pub mod scheduler;
pub mod sequence;

mod runtime;

pub use automator::{Automator, AutomatorBuilder, Status};
pub use chain::{Chain, ClickPos};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result, TaskError};
pub use executor::{TaskHandle, TaskId, TaskStatus};
pub use logging::{init_logging, LoggingConfig};
pub use scheduler::Priority;
pub use sequence::{create_task, strict_sequence, Step};
