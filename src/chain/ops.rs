//! Device operations submitted by chains and sequence steps.
//!
//! Each one applies its pre-delay, resolves the target device (explicit URI
//! or the active one) and reports a missing collaborator or a miss as an
//! error so the task fails.

use crate::device::{
    Device, DeviceRegistry, OcrEngine, Point, Rect, Screenshot, TemplateMatcher,
};
use crate::error::{Error, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Click target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickPos {
    /// Client-area pixel.
    Absolute(Point),
    /// Fractions of the device resolution, `0.0..=1.0` per axis.
    Relative(f64, f64),
}

impl From<Point> for ClickPos {
    fn from(point: Point) -> Self {
        ClickPos::Absolute(point)
    }
}

impl From<(i32, i32)> for ClickPos {
    fn from((x, y): (i32, i32)) -> Self {
        ClickPos::Absolute(Point::new(x, y))
    }
}

/// Everything an operation may call into.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub devices: Arc<DeviceRegistry>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub matcher: Option<Arc<dyn TemplateMatcher>>,
}

impl Collaborators {
    fn device(&self, uri: Option<&str>) -> Result<Arc<dyn Device>> {
        self.devices.resolve(uri)
    }

    fn ocr(&self) -> Result<&Arc<dyn OcrEngine>> {
        self.ocr
            .as_ref()
            .ok_or_else(|| Error::ocr("no OCR engine configured"))
    }

    fn matcher(&self) -> Result<&Arc<dyn TemplateMatcher>> {
        self.matcher
            .as_ref()
            .ok_or_else(|| Error::template("no template matcher configured"))
    }
}

fn apply_delay(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

pub(crate) fn click(
    c: &Collaborators,
    pos: ClickPos,
    delay: Duration,
    device: Option<&str>,
) -> Result<Point> {
    apply_delay(delay);
    let device = c.device(device)?;
    let resolution = device.resolution()?;

    let point = match pos {
        ClickPos::Absolute(point) => point,
        ClickPos::Relative(fx, fy) => {
            if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
                return Err(Error::device(format!(
                    "relative position ({}, {}) outside 0..=1",
                    fx, fy
                )));
            }
            resolution.scale(fx, fy)
        }
    };
    if !resolution.contains(point) {
        return Err(Error::device(format!(
            "click {} outside resolution {}",
            point, resolution
        )));
    }

    device.click(point)?;
    tracing::debug!(%point, "clicked");
    Ok(point)
}

pub(crate) fn key_press(
    c: &Collaborators,
    key: &str,
    duration: Duration,
    delay: Duration,
    device: Option<&str>,
) -> Result<()> {
    apply_delay(delay);
    c.device(device)?.key_press(key, duration)?;
    tracing::debug!(key, duration_ms = duration.as_millis() as u64, "key pressed");
    Ok(())
}

pub(crate) fn text_input(
    c: &Collaborators,
    text: &str,
    delay: Duration,
    device: Option<&str>,
) -> Result<()> {
    apply_delay(delay);
    c.device(device)?.text_input(text)?;
    tracing::debug!(chars = text.chars().count(), "text entered");
    Ok(())
}

pub(crate) fn screenshot(
    c: &Collaborators,
    delay: Duration,
    device: Option<&str>,
) -> Result<Screenshot> {
    apply_delay(delay);
    c.device(device)?.capture_screen()
}

fn locate_template(
    c: &Collaborators,
    device: &dyn Device,
    template: &str,
) -> Result<Option<Point>> {
    let matcher = c.matcher()?;
    let screen = device.capture_screen()?;
    let resolution = device.resolution()?;

    let found = matcher.match_template(&screen, template, resolution)?;
    if let Some(m) = &found {
        tracing::debug!(template, confidence = m.confidence, center = %m.center(), "template matched");
    }
    Ok(found.map(|m| m.center()))
}

pub(crate) fn template_click(
    c: &Collaborators,
    template: &str,
    delay: Duration,
    device: Option<&str>,
) -> Result<Point> {
    apply_delay(delay);
    let device = c.device(device)?;
    let point = locate_template(c, device.as_ref(), template)?
        .ok_or_else(|| Error::template(format!("template '{}' not found", template)))?;

    device.click(point)?;
    Ok(point)
}

pub(crate) fn check_element(
    c: &Collaborators,
    template: &str,
    delay: Duration,
    device: Option<&str>,
) -> Result<Option<Point>> {
    apply_delay(delay);
    let device = c.device(device)?;
    locate_template(c, device.as_ref(), template)
}

/// Runs OCR and returns the match in client coordinates.
fn locate_text(
    c: &Collaborators,
    device: &dyn Device,
    text: &str,
    lang: Option<&str>,
    roi: Option<Rect>,
) -> Result<Option<Rect>> {
    if let Some(roi) = roi {
        if roi.x < 0 || roi.y < 0 || roi.is_empty() {
            return Err(Error::ocr(format!("invalid region of interest {:?}", roi)));
        }
    }

    let ocr = c.ocr()?;
    let screen = device.capture_screen()?;
    let found = ocr.find_text_position(&screen, text, lang, roi)?;

    Ok(found.map(|rect| match roi {
        Some(roi) => rect.offset(roi.origin()),
        None => rect,
    }))
}

pub(crate) fn text_click(
    c: &Collaborators,
    text: &str,
    lang: Option<&str>,
    roi: Option<Rect>,
    delay: Duration,
    device: Option<&str>,
) -> Result<Point> {
    apply_delay(delay);
    let device = c.device(device)?;
    let rect = locate_text(c, device.as_ref(), text, lang, roi)?
        .ok_or_else(|| Error::ocr(format!("text '{}' not found", text)))?;

    let point = rect.center();
    device.click(point)?;
    tracing::debug!(text, %point, "text clicked");
    Ok(point)
}

pub(crate) fn find_text(
    c: &Collaborators,
    text: &str,
    lang: Option<&str>,
    roi: Option<Rect>,
    delay: Duration,
    device: Option<&str>,
) -> Result<Option<Rect>> {
    apply_delay(delay);
    let device = c.device(device)?;
    locate_text(c, device.as_ref(), text, lang, roi)
}

pub(crate) fn wait(duration: Duration) -> Result<()> {
    apply_delay(duration);
    Ok(())
}
