//! Timer backed by the tokio runtime.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::{Timer, TimerCallback, TimerHandle};

/// Timer that runs callbacks on the current tokio `LocalSet`.
///
/// Callbacks are not `Send`, so they are spawned with
/// [`tokio::task::spawn_local`].
///
/// # Panics
///
/// `schedule` panics when called outside of a `LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TokioTimer {
    /// Create a tokio timer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Timer for TokioTimer {
    type Handle = TokioTimerHandle;

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TokioTimerHandle {
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TokioTimerHandle { task }
    }
}

/// Handle to a callback scheduled on a [`TokioTimer`].
#[derive(Debug)]
pub struct TokioTimerHandle {
    task: JoinHandle<()>,
}

impl TokioTimerHandle {
    /// Whether the callback has run or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(self) {
        self.task.abort();
    }
}
