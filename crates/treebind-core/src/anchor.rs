//! Liveness of the UI handles listeners are bound to.

use std::collections::HashSet;

/// The widget-lifecycle host: answers whether a UI anchor still exists.
///
/// In a browser this is a lookup by element id. Listeners ask it lazily, when
/// an event reaches them, not when the anchor goes away.
pub trait AnchorHost {
    fn is_attached(&self, anchor_id: &str) -> bool;
    fn attach(&mut self, anchor_id: &str);
    fn detach(&mut self, anchor_id: &str) -> bool;
}

/// In-memory anchor host.
#[derive(Debug, Default, Clone)]
pub struct AnchorSet {
    live: HashSet<String>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl AnchorHost for AnchorSet {
    fn is_attached(&self, anchor_id: &str) -> bool {
        self.live.contains(anchor_id)
    }

    fn attach(&mut self, anchor_id: &str) {
        self.live.insert(anchor_id.to_string());
    }

    fn detach(&mut self, anchor_id: &str) -> bool {
        self.live.remove(anchor_id)
    }
}
