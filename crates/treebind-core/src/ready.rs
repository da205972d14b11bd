//! Continuations waiting for models to become ready.

use tracing::debug;

use crate::error::CallbackError;
use crate::model::ModelStore;
use crate::workspace::Workspace;

pub type ReadyTask = Box<dyn FnOnce(&mut Workspace) -> Result<(), CallbackError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

/// Result of [`Workspace::with_ready_models`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every model was ready; the continuation already ran.
    Ran,
    Queued(WaiterId),
}

struct Waiter {
    id: WaiterId,
    models: Vec<String>,
    task: ReadyTask,
}

#[derive(Default)]
pub struct ReadinessGate {
    waiters: Vec<Waiter>,
    next_id: u64,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("waiting", &self.waiters.len())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, models: Vec<String>, task: ReadyTask) -> WaiterId {
        self.next_id += 1;
        let id = WaiterId(self.next_id);
        self.waiters.push(Waiter { id, models, task });
        id
    }

    pub fn cancel(&mut self, id: WaiterId) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|w| w.id != id);
        before != self.waiters.len()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// True when some queued continuation names `model_id`.
    pub fn waits_on(&self, model_id: &str) -> bool {
        self.waiters.iter().any(|w| w.models.iter().any(|m| m == model_id))
    }

    /// Remove and return every continuation whose models are all ready, in
    /// queueing order. A continuation is handed out once.
    pub(crate) fn take_released(&mut self, store: &ModelStore) -> Vec<ReadyTask> {
        let (released, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|w| w.models.iter().all(|m| store.is_ready(m)));
        self.waiters = waiting;
        if !released.is_empty() {
            debug!(released = released.len(), waiting = self.waiters.len(), "releasing readiness waiters");
        }
        released.into_iter().map(|w| w.task).collect()
    }
}
