use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable behavior for a [`SyncSession`](crate::sync::SyncSession).
///
/// Constructed explicitly by the host and passed in at session creation.
/// There are no ambient defaults read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Quiet period after the last local edit before the document is
    /// serialized and committed to the host.
    pub save_debounce: Duration,
    /// Quiet period before a deferred remote value is reconciled.
    /// `None` means "same as `save_debounce`".
    pub merge_idle: Option<Duration>,
    /// Defer incoming remote values while the editing surface reports
    /// that the user is actively interacting with it.
    pub ignore_remote_while_focused: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(2000),
            merge_idle: None,
            ignore_remote_while_focused: true,
        }
    }
}

impl SyncOptions {
    /// Effective defer window for remote reconciliation.
    pub fn merge_idle(&self) -> Duration {
        self.merge_idle.unwrap_or(self.save_debounce)
    }
}
