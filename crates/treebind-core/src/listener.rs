//! Change listener value objects.

use treebind_xml::Path;

use crate::error::CallbackError;
use crate::events::ChangeEvent;
use crate::workspace::Workspace;

/// Callback invoked with the workspace (so it may read and mutate models,
/// including the one that fired) and the event.
pub type ListenerCallback = Box<dyn FnMut(&mut Workspace, &ChangeEvent) -> Result<(), CallbackError>>;

/// Lifecycle of a registered listener.
///
/// Liveness is checked lazily: a listener stays `Active` after its anchor
/// disappears, moves to `PendingCheck` when the next event reaches it, and
/// becomes `Dead` (unregistered) if the anchor is gone at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Active,
    PendingCheck,
    Dead,
}

/// Binding of one model, an optional tracked selection and a UI anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeListener {
    pub id: String,
    pub model_id: String,
    /// `None` reacts to every fire of the model.
    pub tracking_path: Option<Path>,
    pub anchor_id: String,
    /// Unregister after the first delivery.
    pub once: bool,
}

impl ChangeListener {
    /// A listener whose id is the anchor id.
    pub fn new(model_id: &str, anchor_id: &str) -> Self {
        Self {
            id: anchor_id.to_string(),
            model_id: model_id.to_string(),
            tracking_path: None,
            anchor_id: anchor_id.to_string(),
            once: false,
        }
    }

    /// Use a distinct id, for anchors that own several listeners on one model.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn tracking(mut self, path: Path) -> Self {
        self.tracking_path = Some(path);
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Handle returned by registration.
///
/// The serial distinguishes a listener from a later one registered under the
/// same id: after a replacement the old key reports `Dead`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub model_id: String,
    pub listener_id: String,
    pub serial: u64,
}
