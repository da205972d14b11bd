//! Hierarchical dimension chooser.
//!
//! A dimension is a hierarchy of [`Level`]s such as country, region and
//! station. A non-unique level needs its predecessors to identify a value,
//! so a selection of "station" is the tuple `(country, station)`. The
//! chooser reads and writes such tuples as XML filter groups:
//!
//! ```text
//! <Filter>
//!   <Or dimension="geo">
//!     <And><Expression bRef="country" op="=" value="DE"/><Expression bRef="station" op="=" value="BER"/></And>
//!   </Or>
//!   <And dimension_exclude="geo">
//!     <Or><Expression bRef="country" op="!=" value="FR"/><Expression bRef="country" op="="/></Or>
//!   </And>
//! </Filter>
//! ```
//!
//! The document-level algorithms ([`guess_active_level`], [`reconcile`],
//! [`clean_floating_fragments`], [`add_selection`], [`remove_selection`])
//! are plain functions over [`XmlDocument`](treebind_xml::XmlDocument).
//! [`FilterMerger`] and [`DimensionChooser`] bind them to a
//! [`Workspace`](treebind_core::Workspace).

mod error;
pub use error::ChooserError;

mod hierarchy;
pub use hierarchy::{Hierarchy, Level};

mod filter;
pub use filter::{DimensionPaths, Expression, FilterState, Op, SelectionGroup, EXCLUDE_ATTR, INCLUDE_ATTR};

pub mod staging;

mod resolver;
pub use resolver::{clean_floating_fragments, diff_inputs, guess_active_level, reconcile, CleanupReport, ReconcileOutcome};

mod merge;
pub use merge::{add_selection, clear_dimension, prune_mismatched_groups, remove_selection, FilterMerger, MergeOptions};

mod config;
pub use config::ChooserConfig;

mod chooser;
pub use chooser::{DimensionChooser, LevelInput};
