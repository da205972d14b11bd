//! Cooperative timers over virtual milliseconds.
//!
//! Nothing runs on its own: tasks become due when the owner advances the
//! clock with [`crate::Workspace::advance_time`]. This keeps debouncing
//! deterministic on a single thread.

use std::collections::BTreeMap;

use crate::error::CallbackError;
use crate::workspace::Workspace;

pub type TimerTask = Box<dyn FnOnce(&mut Workspace) -> Result<(), CallbackError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Default)]
pub struct Scheduler {
    now: u64,
    next_id: u64,
    /// Ordered by due time, then by scheduling order.
    queue: BTreeMap<(u64, TimerId), TimerTask>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule(&mut self, delay_ms: u64, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.queue.insert((self.now.saturating_add(delay_ms), id), task);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.queue.keys().find(|(_, t)| *t == id).copied();
        match key {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.queue.keys().any(|(_, t)| *t == id)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Remove the earliest task due at or before `until` and move the clock to
    /// its due time.
    pub(crate) fn pop_due(&mut self, until: u64) -> Option<(TimerId, TimerTask)> {
        let key = *self.queue.keys().next()?;
        if key.0 > until {
            return None;
        }
        let task = self.queue.remove(&key)?;
        self.now = self.now.max(key.0);
        Some((key.1, task))
    }

    pub(crate) fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }
}

/// Last-write-wins debouncing: every trigger cancels the pending task and
/// schedules the new one `delay_ms` later.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    delay_ms: u64,
    pending: Option<TimerId>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn trigger(&mut self, workspace: &mut Workspace, task: TimerTask) -> TimerId {
        self.cancel(workspace);
        let id = workspace.schedule(self.delay_ms, task);
        self.pending = Some(id);
        id
    }

    pub fn cancel(&mut self, workspace: &mut Workspace) -> bool {
        match self.pending.take() {
            Some(id) => workspace.cancel_timer(id),
            None => false,
        }
    }

    pub fn is_pending(&self, workspace: &Workspace) -> bool {
        self.pending.is_some_and(|id| workspace.timer_pending(id))
    }
}
