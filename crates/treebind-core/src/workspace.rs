//! The injected context every widget works against.

use tracing::{debug, trace, warn};
use treebind_xml::{XmlDocument, XmlError};

use crate::anchor::{AnchorHost, AnchorSet};
use crate::error::{CallbackError, TrackingError};
use crate::events::{ChangeEvent, ChangeOrigin, FireReport};
use crate::listener::{ChangeListener, ListenerCallback, ListenerKey, ListenerState};
use crate::model::{Model, ModelStore, ReadyState};
use crate::ready::{ReadinessGate, Readiness, WaiterId};
use crate::registry::ListenerRegistry;
use crate::timer::{Scheduler, TimerId};

/// Document store, listener registry, anchor host, readiness gate and timer
/// scheduler in one owned value.
///
/// All mutation and notification is synchronous. Callbacks receive
/// `&mut Workspace` and may mutate and fire any model, including the one
/// being dispatched.
pub struct Workspace {
    models: ModelStore,
    listeners: ListenerRegistry,
    anchors: Box<dyn AnchorHost>,
    gate: ReadinessGate,
    scheduler: Scheduler,
    origin_serial: u64,
    fire_depth: usize,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("models", &self.models.ids().collect::<Vec<_>>())
            .field("listeners", &self.listeners)
            .field("gate", &self.gate)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_anchor_host(Box::new(AnchorSet::new()))
    }

    pub fn with_anchor_host(anchors: Box<dyn AnchorHost>) -> Self {
        Self {
            models: ModelStore::new(),
            listeners: ListenerRegistry::new(),
            anchors,
            gate: ReadinessGate::new(),
            scheduler: Scheduler::new(),
            origin_serial: 0,
            fire_depth: 0,
        }
    }

    // ------------------------------------------------------------------ models

    /// Add a model in the `Initialized` state.
    pub fn add_model(&mut self, id: &str, document: XmlDocument) -> Result<(), TrackingError> {
        self.models.insert(id, document, ReadyState::Initialized)
    }

    /// Add a model that is immediately ready and release its waiters.
    pub fn add_ready_model(&mut self, id: &str, document: XmlDocument) -> Result<(), TrackingError> {
        self.models.insert(id, document, ReadyState::Ready)?;
        self.release_waiters();
        Ok(())
    }

    pub fn has_model(&self, id: &str) -> bool {
        self.models.contains(id)
    }

    pub fn model(&self, id: &str) -> Result<&Model, TrackingError> {
        self.models.get(id)
    }

    pub fn document(&self, id: &str) -> Result<&XmlDocument, TrackingError> {
        Ok(&self.models.get(id)?.document)
    }

    /// Mutable access without notification. Callers fire once after the batch.
    pub fn document_mut(&mut self, id: &str) -> Result<&mut XmlDocument, TrackingError> {
        Ok(&mut self.models.get_mut(id)?.document)
    }

    pub fn model_state(&self, id: &str) -> Result<&ReadyState, TrackingError> {
        Ok(&self.models.get(id)?.state)
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.models.is_ready(id)
    }

    pub fn set_ready_state(&mut self, id: &str, state: ReadyState) -> Result<(), TrackingError> {
        let model = self.models.get_mut(id)?;
        if let ReadyState::Failed(reason) = &state {
            if self.gate.waits_on(id) {
                warn!(model = id, reason = %reason, "model failed while continuations wait for it");
            }
        }
        let ready = state == ReadyState::Ready;
        model.state = state;
        if ready {
            self.release_waiters();
        }
        Ok(())
    }

    /// Install a freshly loaded document, mark the model ready and fire.
    /// Unknown ids are added.
    pub fn replace_document(&mut self, id: &str, document: XmlDocument) -> Result<FireReport, TrackingError> {
        match self.models.get_mut(id) {
            Ok(model) => {
                model.document = document;
                model.state = ReadyState::Ready;
            }
            Err(_) => self.models.insert(id, document, ReadyState::Ready)?,
        }
        self.release_waiters();
        self.fire(id)
    }

    /// Remove a model together with its listeners.
    pub fn remove_model(&mut self, id: &str) -> Result<Model, TrackingError> {
        let model = self.models.remove(id)?;
        let dropped = self.listeners.remove_model(id);
        if self.gate.waits_on(id) {
            warn!(model = id, "removed model has waiting continuations");
        }
        debug!(model = id, listeners = dropped, "model removed");
        Ok(model)
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.ids().map(str::to_string).collect()
    }

    // --------------------------------------------------------------- mutation

    /// A fresh origin for one logical mutation by `owner`.
    pub fn next_origin(&mut self, owner: &str) -> ChangeOrigin {
        self.origin_serial += 1;
        ChangeOrigin {
            owner: owner.to_string(),
            serial: self.origin_serial,
        }
    }

    /// Run `f` against the document of `id`, then fire exactly once.
    ///
    /// Nothing is fired when `f` fails; partial mutations stay in place.
    pub fn update<T>(
        &mut self,
        id: &str,
        origin: Option<ChangeOrigin>,
        f: impl FnOnce(&mut XmlDocument) -> Result<T, XmlError>,
    ) -> Result<(T, FireReport), TrackingError> {
        self.try_update(id, origin, |doc| f(doc).map_err(TrackingError::from))
    }

    /// [`update`](Self::update) for callers with their own error type.
    pub fn try_update<T, E>(
        &mut self,
        id: &str,
        origin: Option<ChangeOrigin>,
        f: impl FnOnce(&mut XmlDocument) -> Result<T, E>,
    ) -> Result<(T, FireReport), E>
    where
        E: From<TrackingError>,
    {
        let document = self.document_mut(id)?;
        let value = f(document)?;
        let report = self.fire_as(id, origin)?;
        Ok((value, report))
    }

    // ------------------------------------------------------------- listeners

    /// Register a listener. The tracked selection is snapshotted now if the
    /// model exists, so the first fire reaches the listener only on change.
    pub fn register(&mut self, listener: ChangeListener, callback: ListenerCallback) -> ListenerKey {
        let snapshot = match (&listener.tracking_path, self.models.get(&listener.model_id)) {
            (Some(path), Ok(model)) => Some(model.document.snapshot(path)),
            _ => None,
        };
        let key = self.listeners.insert(listener, callback, snapshot);
        trace!(model = %key.model_id, listener = %key.listener_id, "listener registered");
        key
    }

    pub fn unregister(&mut self, key: &ListenerKey) -> bool {
        self.listeners.unregister(key)
    }

    /// Explicit disposal of everything bound to an anchor.
    pub fn unregister_anchor(&mut self, anchor_id: &str) -> usize {
        self.listeners.unregister_anchor(anchor_id)
    }

    pub fn is_registered(&self, key: &ListenerKey) -> bool {
        self.listeners.is_registered(key)
    }

    pub fn listener_state(&self, key: &ListenerKey) -> ListenerState {
        self.listeners.state(key)
    }

    pub fn listener_count(&self, model_id: &str) -> usize {
        self.listeners.len(model_id)
    }

    // ---------------------------------------------------------------- anchors

    pub fn attach_anchor(&mut self, anchor_id: &str) {
        self.anchors.attach(anchor_id);
    }

    /// Detach an anchor. Its listeners stay registered until the next fire
    /// reaches them.
    pub fn detach_anchor(&mut self, anchor_id: &str) -> bool {
        self.anchors.detach(anchor_id)
    }

    pub fn is_anchor_attached(&self, anchor_id: &str) -> bool {
        self.anchors.is_attached(anchor_id)
    }

    // --------------------------------------------------------------- dispatch

    /// Fire without an origin.
    pub fn fire(&mut self, id: &str) -> Result<FireReport, TrackingError> {
        self.fire_as(id, None)
    }

    /// Notify the listeners of `id` in registration order.
    ///
    /// Each listener is first checked for a live anchor and unregistered if
    /// the anchor is gone. Listeners with a tracking path are invoked only
    /// when their selection changed since their last delivery. A listener
    /// whose callback is already on the stack is skipped. Callback errors are
    /// logged and do not stop the dispatch.
    pub fn fire_as(&mut self, id: &str, origin: Option<ChangeOrigin>) -> Result<FireReport, TrackingError> {
        let revision = self.models.get(id)?.document.revision();
        let event = ChangeEvent {
            model_id: id.to_string(),
            origin,
            revision,
            depth: self.fire_depth,
        };

        self.fire_depth += 1;
        let report = self.dispatch(&event);
        self.fire_depth -= 1;
        Ok(report)
    }

    fn dispatch(&mut self, event: &ChangeEvent) -> FireReport {
        let model_id = event.model_id.as_str();
        let mut report = FireReport::default();

        for (listener_id, serial) in self.listeners.keys(model_id) {
            // Unregistered or replaced by an earlier callback of this fire.
            let Some(slot) = self.listeners.slot_mut(model_id, &listener_id, serial) else {
                continue;
            };
            slot.state = ListenerState::PendingCheck;

            if !self.anchors.is_attached(&slot.listener.anchor_id) {
                debug!(model = model_id, listener = %listener_id, anchor = %slot.listener.anchor_id, "anchor gone, unregistering listener");
                self.listeners.remove(model_id, &listener_id, serial);
                report.dropped += 1;
                continue;
            }
            slot.state = ListenerState::Active;

            let Some(mut callback) = slot.callback.take() else {
                trace!(model = model_id, listener = %listener_id, "listener already running, skipped");
                report.skipped += 1;
                continue;
            };

            if let Some(path) = &slot.listener.tracking_path {
                // A fire issued by a callback may have removed the model.
                let Ok(model) = self.models.get(model_id) else {
                    slot.callback = Some(callback);
                    break;
                };
                let current = model.document.snapshot(path);
                if slot.snapshot.as_deref() == Some(current.as_str()) {
                    trace!(model = model_id, listener = %listener_id, "tracked selection unchanged");
                    slot.callback = Some(callback);
                    report.skipped += 1;
                    continue;
                }
                slot.snapshot = Some(current);
            }
            let once = slot.listener.once;

            trace!(model = model_id, listener = %listener_id, depth = event.depth, "delivering change");
            let result = callback(self, event);

            if once {
                self.listeners.remove(model_id, &listener_id, serial);
            } else if let Some(slot) = self.listeners.slot_mut(model_id, &listener_id, serial) {
                slot.callback = Some(callback);
            }

            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(model = model_id, listener = %listener_id, error = %err, "listener callback failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    // -------------------------------------------------------------- readiness

    /// Run `task` once every model in `ids` is ready.
    ///
    /// Runs synchronously when they already are; otherwise the continuation
    /// is queued and runs exactly once, from the call that makes the last of
    /// them ready. Errors are logged.
    pub fn with_ready_models<F>(&mut self, ids: &[&str], task: F) -> Readiness
    where
        F: FnOnce(&mut Workspace) -> Result<(), CallbackError> + 'static,
    {
        if ids.iter().all(|id| self.models.is_ready(id)) {
            if let Err(err) = task(self) {
                warn!(models = ?ids, error = %err, "readiness continuation failed");
            }
            return Readiness::Ran;
        }
        let models = ids.iter().map(|id| id.to_string()).collect();
        Readiness::Queued(self.gate.enqueue(models, Box::new(task)))
    }

    pub fn cancel_waiter(&mut self, id: WaiterId) -> bool {
        self.gate.cancel(id)
    }

    pub fn waiting(&self) -> usize {
        self.gate.len()
    }

    fn release_waiters(&mut self) {
        for task in self.gate.take_released(&self.models) {
            if let Err(err) = task(self) {
                warn!(error = %err, "readiness continuation failed");
            }
        }
    }

    // ----------------------------------------------------------------- timers

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn schedule<F>(&mut self, delay_ms: u64, task: F) -> TimerId
    where
        F: FnOnce(&mut Workspace) -> Result<(), CallbackError> + 'static,
    {
        self.scheduler.schedule(delay_ms, Box::new(task))
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn timer_pending(&self, id: TimerId) -> bool {
        self.scheduler.is_pending(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Advance the virtual clock, running due tasks in due order. Tasks
    /// scheduled by running tasks run too if they fall inside the window.
    /// Returns the number of tasks run.
    pub fn advance_time(&mut self, ms: u64) -> usize {
        let until = self.scheduler.now().saturating_add(ms);
        let mut ran = 0;
        while let Some((id, task)) = self.scheduler.pop_due(until) {
            ran += 1;
            if let Err(err) = task(self) {
                warn!(timer = ?id, error = %err, "timer task failed");
            }
        }
        self.scheduler.set_now(until);
        ran
    }
}
