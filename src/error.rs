use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid priority {0}: must be within 1..=10")]
    InvalidPriority(u8),

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("ocr error: {0}")]
    Ocr(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("task failed: {0}")]
    Task(#[from] TaskError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn device<S: Into<String>>(msg: S) -> Self {
        Error::Device(msg.into())
    }

    pub fn ocr<S: Into<String>>(msg: S) -> Self {
        Error::Ocr(msg.into())
    }

    pub fn template<S: Into<String>>(msg: S) -> Self {
        Error::Template(msg.into())
    }
}

/// Failure captured into a task's future.
///
/// Cheap to clone so every `catch` handler and every reader of
/// `TaskHandle::error` can get its own copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl TaskError {
    pub fn failed<S: Into<String>>(msg: S) -> Self {
        TaskError::Failed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

impl From<Error> for TaskError {
    fn from(err: Error) -> Self {
        match err {
            Error::Task(inner) => inner,
            other => TaskError::Failed(other.to_string()),
        }
    }
}

/// Shared "most recent failure" cell. Every new record overwrites the last.
#[derive(Debug, Clone, Default)]
pub struct LastError {
    slot: Arc<Mutex<Option<String>>>,
}

impl LastError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(&self, msg: S) {
        *self.slot.lock() = Some(msg.into());
    }

    pub fn get(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}
