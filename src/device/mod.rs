//! Collaborators the scheduler drives but does not own.
//!
//! Concrete drivers (window automation, ADB, OCR models, image matching)
//! live outside this crate and plug in through the traits below. None of
//! them are serialised by the executor: two tasks targeting the same device
//! may call into it concurrently.

mod registry;
mod types;

pub use registry::DeviceRegistry;
pub use types::{MatchResult, Point, Rect, Resolution, Screenshot};

use crate::error::Result;
use std::time::Duration;

/// A controllable screen: click, key, text input, capture.
pub trait Device: Send + Sync {
    fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Clicks at client-area coordinates.
    fn click(&self, point: Point) -> Result<()>;

    fn key_press(&self, key: &str, duration: Duration) -> Result<()>;

    fn text_input(&self, text: &str) -> Result<()>;

    fn capture_screen(&self) -> Result<Screenshot>;

    fn resolution(&self) -> Result<Resolution>;
}

pub trait OcrEngine: Send + Sync {
    /// Locates `text` in `image`. When `roi` is given only that region is
    /// searched and the returned rectangle is relative to its origin.
    fn find_text_position(
        &self,
        image: &Screenshot,
        text: &str,
        lang: Option<&str>,
        roi: Option<Rect>,
    ) -> Result<Option<Rect>>;
}

pub trait TemplateMatcher: Send + Sync {
    /// Finds the named template in `image`, scaled for `resolution`.
    fn match_template(
        &self,
        image: &Screenshot,
        template: &str,
        resolution: Resolution,
    ) -> Result<Option<MatchResult>>;
}
