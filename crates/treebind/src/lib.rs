//! treebind: widgets bound to shared XML models.
//!
//! - [`xml`]: mutable XML documents addressed by an XPath subset.
//! - [`core`]: the [`Workspace`](core::Workspace) with models, change
//!   listeners, readiness waits and timers.
//! - [`chooser`]: hierarchical dimension choosers writing filter fragments.
//! - [`suggest`]: multi-level suggestions over option models.
//!
//! [`cli`] holds the logic of the `xml-select` and `xml-suggest` binaries.

pub use treebind_chooser as chooser;
pub use treebind_core as core;
pub use treebind_suggest as suggest;
pub use treebind_xml as xml;

pub mod cli;

pub mod prelude {
    pub use treebind_chooser::{ChooserConfig, DimensionChooser, Hierarchy, Level, MergeOptions, SelectionGroup};
    pub use treebind_core::{ChangeListener, ChangeOrigin, FireReport, ReadyState, Workspace};
    pub use treebind_suggest::{Candidate, Query, SuggestConfig, SuggestInput, SuggestMatcher, WildcardMode};
    pub use treebind_xml::{Path, PathParser, XmlDocument};
}
