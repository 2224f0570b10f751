#![allow(dead_code)]

use autochain::device::{Device, MatchResult, OcrEngine, Point, Rect, Resolution, Screenshot, TemplateMatcher};
use autochain::{Automator, Config, Error, Result, TaskError};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const MAIN_DEVICE: &str = "fake://main";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click(Point),
    Key(String, Duration),
    Text(String),
    Capture,
}

/// In-memory device that records what it was asked to do.
pub struct FakeDevice {
    resolution: Resolution,
    connected: AtomicBool,
    actions: Mutex<Vec<Action>>,
}

impl FakeDevice {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            resolution: Resolution::new(width, height),
            connected: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
        })
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.actions
            .lock()
            .iter()
            .filter_map(|action| match action {
                Action::Click(point) => Some(*point),
                _ => None,
            })
            .collect()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Device for FakeDevice {
    fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn click(&self, point: Point) -> Result<()> {
        self.actions.lock().push(Action::Click(point));
        Ok(())
    }

    fn key_press(&self, key: &str, duration: Duration) -> Result<()> {
        self.actions
            .lock()
            .push(Action::Key(key.to_string(), duration));
        Ok(())
    }

    fn text_input(&self, text: &str) -> Result<()> {
        self.actions.lock().push(Action::Text(text.to_string()));
        Ok(())
    }

    fn capture_screen(&self) -> Result<Screenshot> {
        self.actions.lock().push(Action::Capture);
        let len = (self.resolution.width * self.resolution.height * 4) as usize;
        Ok(Screenshot::new(self.resolution, vec![0u8; len]))
    }

    fn resolution(&self) -> Result<Resolution> {
        Ok(self.resolution)
    }
}

/// OCR engine answering from a fixed table. Rectangles are returned as-is,
/// i.e. relative to whatever region was searched.
#[derive(Default)]
pub struct FakeOcr {
    texts: HashMap<String, Rect>,
    seen_roi: Mutex<Vec<Option<Rect>>>,
}

impl FakeOcr {
    pub fn with_text(mut self, text: &str, rect: Rect) -> Self {
        self.texts.insert(text.to_string(), rect);
        self
    }

    pub fn seen_roi(&self) -> Vec<Option<Rect>> {
        self.seen_roi.lock().clone()
    }
}

impl OcrEngine for FakeOcr {
    fn find_text_position(
        &self,
        _image: &Screenshot,
        text: &str,
        _lang: Option<&str>,
        roi: Option<Rect>,
    ) -> Result<Option<Rect>> {
        self.seen_roi.lock().push(roi);
        if text == "explode" {
            return Err(Error::ocr("model crashed"));
        }
        Ok(self.texts.get(text).copied())
    }
}

#[derive(Default)]
pub struct FakeMatcher {
    templates: HashMap<String, Rect>,
}

impl FakeMatcher {
    pub fn with_template(mut self, name: &str, rect: Rect) -> Self {
        self.templates.insert(name.to_string(), rect);
        self
    }
}

impl TemplateMatcher for FakeMatcher {
    fn match_template(
        &self,
        _image: &Screenshot,
        template: &str,
        _resolution: Resolution,
    ) -> Result<Option<MatchResult>> {
        Ok(self.templates.get(template).map(|rect| MatchResult {
            rect: *rect,
            confidence: 0.95,
        }))
    }
}

pub fn test_config(workers: usize) -> Config {
    Config::builder()
        .num_workers(workers)
        .pause_poll_interval(Duration::from_millis(20))
        .pop_timeout(Duration::from_millis(20))
        .stop_grace_period(Duration::from_millis(500))
        .step_wait_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

pub struct Fixture {
    pub automator: Automator,
    pub device: Arc<FakeDevice>,
}

/// Automator with one 1280x720 fake device plus OCR and template fakes.
/// Workers are not started.
pub fn fixture(workers: usize) -> Fixture {
    let device = FakeDevice::new(1280, 720);
    let ocr = FakeOcr::default()
        .with_text("Start", Rect::new(100, 200, 40, 20))
        .with_text("Claim", Rect::new(10, 10, 20, 10));
    let matcher = FakeMatcher::default().with_template("close_button", Rect::new(600, 300, 50, 50));

    let automator = Automator::builder()
        .config(test_config(workers))
        .device(MAIN_DEVICE, device.clone())
        .ocr_engine(Arc::new(ocr))
        .template_matcher(Arc::new(matcher))
        .build()
        .unwrap();

    Fixture { automator, device }
}

/// Operation that blocks its worker until the returned sender fires (or is
/// dropped), with a safety timeout.
pub fn gate() -> (Sender<()>, impl FnOnce() -> std::result::Result<(), TaskError> + Send + 'static)
{
    let (tx, rx): (Sender<()>, Receiver<()>) = bounded(1);
    let op = move || {
        let _ = rx.recv_timeout(Duration::from_secs(5));
        Ok(())
    };
    (tx, op)
}

/// Operation that records `label` into `log` when it runs.
pub fn recorder<T: Send + 'static>(
    log: &Arc<Mutex<Vec<T>>>,
    label: T,
) -> impl FnOnce() -> std::result::Result<(), TaskError> + Send + 'static {
    let log = log.clone();
    move || {
        log.lock().push(label);
        Ok(())
    }
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn eventually<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
