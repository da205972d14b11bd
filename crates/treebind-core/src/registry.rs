//! Per-model listener storage.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::listener::{ChangeListener, ListenerCallback, ListenerKey, ListenerState};

pub(crate) struct Slot {
    pub(crate) listener: ChangeListener,
    /// Taken out while the callback runs.
    pub(crate) callback: Option<ListenerCallback>,
    pub(crate) state: ListenerState,
    /// Last serialized selection of `tracking_path`.
    pub(crate) snapshot: Option<String>,
    pub(crate) serial: u64,
}

/// Listeners keyed by model id, then listener id, in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    by_model: HashMap<String, IndexMap<String, Slot>>,
    next_serial: u64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (model, slots) in &self.by_model {
            map.entry(model, &slots.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. A listener already registered under the same id on the
    /// same model is replaced and counts as unregistered.
    pub(crate) fn insert(
        &mut self,
        listener: ChangeListener,
        callback: ListenerCallback,
        snapshot: Option<String>,
    ) -> ListenerKey {
        self.next_serial += 1;
        let serial = self.next_serial;
        let key = ListenerKey {
            model_id: listener.model_id.clone(),
            listener_id: listener.id.clone(),
            serial,
        };

        let slots = self.by_model.entry(listener.model_id.clone()).or_default();
        if slots.shift_remove(&listener.id).is_some() {
            debug!(model = %key.model_id, listener = %key.listener_id, "replacing listener registered under the same id");
        }
        slots.insert(
            listener.id.clone(),
            Slot {
                listener,
                callback: Some(callback),
                state: ListenerState::Active,
                snapshot,
                serial,
            },
        );
        key
    }

    /// Listener ids and serials of a model, in registration order.
    pub(crate) fn keys(&self, model_id: &str) -> Vec<(String, u64)> {
        self.by_model
            .get(model_id)
            .map(|slots| slots.iter().map(|(id, s)| (id.clone(), s.serial)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn slot_mut(&mut self, model_id: &str, listener_id: &str, serial: u64) -> Option<&mut Slot> {
        self.by_model
            .get_mut(model_id)?
            .get_mut(listener_id)
            .filter(|s| s.serial == serial)
    }

    pub(crate) fn remove(&mut self, model_id: &str, listener_id: &str, serial: u64) -> bool {
        let Some(slots) = self.by_model.get_mut(model_id) else {
            return false;
        };
        if slots.get(listener_id).is_some_and(|s| s.serial == serial) {
            slots.shift_remove(listener_id);
            true
        } else {
            false
        }
    }

    pub fn unregister(&mut self, key: &ListenerKey) -> bool {
        self.remove(&key.model_id, &key.listener_id, key.serial)
    }

    /// Unregister every listener bound to `anchor_id`.
    pub fn unregister_anchor(&mut self, anchor_id: &str) -> usize {
        let mut removed = 0;
        for slots in self.by_model.values_mut() {
            let before = slots.len();
            slots.retain(|_, s| s.listener.anchor_id != anchor_id);
            removed += before - slots.len();
        }
        removed
    }

    pub(crate) fn remove_model(&mut self, model_id: &str) -> usize {
        self.by_model.remove(model_id).map(|s| s.len()).unwrap_or(0)
    }

    pub fn state(&self, key: &ListenerKey) -> ListenerState {
        self.by_model
            .get(&key.model_id)
            .and_then(|slots| slots.get(&key.listener_id))
            .filter(|s| s.serial == key.serial)
            .map(|s| s.state)
            .unwrap_or(ListenerState::Dead)
    }

    pub fn is_registered(&self, key: &ListenerKey) -> bool {
        self.state(key) != ListenerState::Dead
    }

    pub fn len(&self, model_id: &str) -> usize {
        self.by_model.get(model_id).map(IndexMap::len).unwrap_or(0)
    }

    pub fn listener(&self, model_id: &str, listener_id: &str) -> Option<&ChangeListener> {
        self.by_model.get(model_id)?.get(listener_id).map(|s| &s.listener)
    }
}
