//! One-shot, cancellable delayed callbacks.
//!
//! The reconnecting socket arms at most one timer at a time. Hosts pick the
//! implementation: [`ManualTimer`] for deterministic, externally driven
//! clocks and [`TokioTimer`] for a tokio `LocalSet`.

mod manual;

#[cfg(feature = "async-tokio")]
mod tokio_impl;

pub use manual::{ManualTimer, ManualTimerHandle};

#[cfg(feature = "async-tokio")]
pub use tokio_impl::{TokioTimer, TokioTimerHandle};

use std::time::Duration;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Schedules one-shot callbacks.
pub trait Timer {
    /// Handle used to cancel a scheduled callback.
    type Handle: TimerHandle + 'static;

    /// Run `callback` once after `delay`.
    ///
    /// Implementations must never run the callback before `schedule`
    /// returns, even for a zero delay.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> Self::Handle;
}

/// Cancels a scheduled callback.
pub trait TimerHandle {
    /// Prevent the callback from running. A no-op if it already ran.
    fn cancel(self);
}
