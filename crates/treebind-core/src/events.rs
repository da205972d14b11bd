/// Identifies who performed a mutation.
///
/// Widgets tag the fires of their own writes with an origin and ignore events
/// whose owner is themselves. Every mutation gets a fresh serial, so there is
/// no shared "internal change" flag to set and reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeOrigin {
    pub owner: String,
    pub serial: u64,
}

impl ChangeOrigin {
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub model_id: String,
    /// `None` for fires not attributed to a widget (loads, external writers).
    pub origin: Option<ChangeOrigin>,
    /// Document revision at the time of the fire.
    pub revision: u64,
    /// 0 for a top-level fire, incremented for fires issued from callbacks.
    pub depth: usize,
}

impl ChangeEvent {
    /// True when the event was caused by `owner` itself.
    pub fn is_own(&self, owner: &str) -> bool {
        self.origin.as_ref().is_some_and(|o| o.is_owned_by(owner))
    }
}

/// Outcome of one fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Callbacks invoked and returned `Ok`.
    pub delivered: usize,
    /// Listeners whose tracked selection did not change, or whose callback was
    /// already running further up the stack.
    pub skipped: usize,
    /// Listeners unregistered because their anchor was gone.
    pub dropped: usize,
    /// Callbacks that returned an error.
    pub failed: usize,
}

impl FireReport {
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }
}
