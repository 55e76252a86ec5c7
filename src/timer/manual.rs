//! Deterministic timer driven by an explicit virtual clock.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::{Timer, TimerCallback, TimerHandle};

// (deadline, sequence) keeps equal deadlines in scheduling order.
type Key = (Duration, u64);

#[derive(Default)]
struct Schedule {
    now: Duration,
    next_seq: u64,
    entries: BTreeMap<Key, TimerCallback>,
}

/// Timer whose clock only moves when told to.
///
/// Nothing fires until [`advance`](Self::advance) or
/// [`fire_next`](Self::fire_next) is called, which makes reconnect sequences
/// reproducible in tests and lets hosts with their own event loop drive the
/// reconnecting socket without an async runtime. Clones share one clock.
#[derive(Clone, Default)]
pub struct ManualTimer {
    schedule: Rc<RefCell<Schedule>>,
}

impl ManualTimer {
    /// Create a timer at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.schedule.borrow().now
    }

    /// Number of callbacks waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.schedule.borrow().entries.len()
    }

    /// Time remaining until the earliest pending callback.
    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        let schedule = self.schedule.borrow();
        schedule
            .entries
            .keys()
            .next()
            .map(|(deadline, _)| deadline.saturating_sub(schedule.now))
    }

    /// Move the clock forward by `by`, firing every callback that falls due,
    /// including ones scheduled by callbacks along the way. Returns the
    /// number of callbacks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let mut fired = 0;
        while let Some(callback) = self.pop_due(target) {
            callback();
            fired += 1;
        }
        self.schedule.borrow_mut().now = target;
        fired
    }

    /// Jump to the earliest deadline and fire that one callback.
    /// Returns `false` if nothing is pending.
    pub fn fire_next(&self) -> bool {
        let due = {
            let mut schedule = self.schedule.borrow_mut();
            schedule.entries.pop_first().map(|((deadline, _), callback)| {
                schedule.now = schedule.now.max(deadline);
                callback
            })
        };
        match due {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    fn pop_due(&self, target: Duration) -> Option<TimerCallback> {
        let mut schedule = self.schedule.borrow_mut();
        let (&(deadline, _), _) = schedule.entries.first_key_value()?;
        if deadline > target {
            return None;
        }
        let (_, callback) = schedule.entries.pop_first()?;
        schedule.now = schedule.now.max(deadline);
        Some(callback)
    }
}

impl Timer for ManualTimer {
    type Handle = ManualTimerHandle;

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> ManualTimerHandle {
        let mut schedule = self.schedule.borrow_mut();
        let key = (schedule.now.saturating_add(delay), schedule.next_seq);
        schedule.next_seq += 1;
        schedule.entries.insert(key, callback);
        ManualTimerHandle {
            key,
            schedule: Rc::downgrade(&self.schedule),
        }
    }
}

/// Handle to a callback scheduled on a [`ManualTimer`].
pub struct ManualTimerHandle {
    key: Key,
    schedule: Weak<RefCell<Schedule>>,
}

impl ManualTimerHandle {
    /// Absolute virtual time at which the callback fires.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.key.0
    }
}

impl TimerHandle for ManualTimerHandle {
    fn cancel(self) {
        if let Some(schedule) = self.schedule.upgrade() {
            // Dropped outside the borrow: a callback may own other handles.
            let removed = schedule.borrow_mut().entries.remove(&self.key);
            drop(removed);
        }
    }
}

impl std::fmt::Debug for ManualTimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimerHandle")
            .field("deadline", &self.key.0)
            .finish()
    }
}
