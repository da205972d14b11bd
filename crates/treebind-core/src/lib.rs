//! Change tracking for shared XML models.
//!
//! A [`Workspace`] owns the models (documents addressed by id), the listener
//! registry, the anchor host that answers whether a widget still exists, a
//! readiness gate for continuations waiting on models to load, and a
//! cooperative timer scheduler.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use treebind_core::{ChangeListener, Workspace};
//! use treebind_xml::{PathParser, XmlDocument};
//!
//! let mut ws = Workspace::new();
//! ws.add_ready_model("status", XmlDocument::parse(r#"<Status><Level id=""/></Status>"#).unwrap()).unwrap();
//! ws.attach_anchor("chooser");
//!
//! let seen = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&seen);
//! let level = PathParser::parse("/Status/Level/@id").unwrap();
//! ws.register(
//!     ChangeListener::new("status", "chooser").tracking(level.clone()),
//!     Box::new(move |_, _| {
//!         counter.set(counter.get() + 1);
//!         Ok(())
//!     }),
//! );
//!
//! ws.update("status", None, |doc| doc.set_value(&level, "country")).unwrap();
//! assert_eq!(seen.get(), 1);
//! ```

mod error;
pub use error::{CallbackError, TrackingError};

mod events;
pub use events::{ChangeEvent, ChangeOrigin, FireReport};

mod anchor;
pub use anchor::{AnchorHost, AnchorSet};

mod model;
pub use model::{Model, ModelStore, ReadyState};

mod listener;
pub use listener::{ChangeListener, ListenerCallback, ListenerKey, ListenerState};

mod registry;
pub use registry::ListenerRegistry;

mod ready;
pub use ready::{ReadinessGate, Readiness, ReadyTask, WaiterId};

mod timer;
pub use timer::{Debouncer, Scheduler, TimerId, TimerTask};

mod workspace;
pub use workspace::Workspace;
