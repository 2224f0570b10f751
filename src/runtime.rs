use crate::chain::dispatch::DispatchSender;
use crate::chain::ops::Collaborators;
use crate::config::Config;
use crate::error::LastError;
use crate::executor::TaskExecutor;
use std::sync::Arc;

/// State shared by an automator and every chain it hands out.
pub(crate) struct Runtime {
    pub executor: Arc<TaskExecutor>,
    pub collaborators: Collaborators,
    pub dispatch: DispatchSender,
    /// Most recent failure seen anywhere in this runtime.
    pub last_error: LastError,
    pub config: Config,
}

impl Runtime {
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("executor", &self.executor)
            .field("devices", &self.collaborators.devices)
            .finish()
    }
}
