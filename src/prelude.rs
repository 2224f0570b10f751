pub use crate::automator::{Automator, AutomatorBuilder, Status};
pub use crate::chain::{Chain, ClickPos};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::device::{
    Device, MatchResult, OcrEngine, Point, Rect, Resolution, Screenshot, TemplateMatcher,
};
pub use crate::error::{Error, Result, TaskError};
pub use crate::executor::{Outcome, TaskHandle, TaskId, TaskStatus};
pub use crate::scheduler::Priority;
pub use crate::sequence::{Step, StepOutput, StepValue};
