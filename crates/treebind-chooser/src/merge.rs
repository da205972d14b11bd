//! Adding and removing selections in a dimension's filter containers.

use std::collections::BTreeSet;

use tracing::debug;
use treebind_core::{ChangeOrigin, FireReport, Workspace};
use treebind_xml::{NodeId, XmlDocument};

use crate::error::ChooserError;
use crate::filter::{DimensionPaths, Expression, Op, SelectionGroup, EXPRESSION};
use crate::hierarchy::Hierarchy;
use crate::resolver::{clean_floating_fragments, CleanupReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Empty the target container first.
    pub replace: bool,
    /// Target the exclusion container.
    pub exclude: bool,
}

impl MergeOptions {
    pub fn include() -> Self {
        Self::default()
    }

    pub fn exclude() -> Self {
        Self {
            replace: false,
            exclude: true,
        }
    }

    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }
}

/// Merge `groups` into the dimension's filter.
///
/// Inclusion: an existing group with the same `(bRef, value)` set is removed
/// before the new one is appended, and so is every group over another bRef
/// set, since all inclusion groups share the arity of one level. Exclusion:
/// groups are appended as `Or` groups of `!=` leaves, each followed by a
/// `bRef = null` companion so that rows without a value are excluded too.
/// `And` groups found in the exclusion container are rewritten the same way.
pub fn add_selection(
    doc: &mut XmlDocument,
    paths: &DimensionPaths,
    groups: &[SelectionGroup],
    options: MergeOptions,
) -> Result<(), ChooserError> {
    let container_path = if options.exclude {
        paths.exclude_container()
    } else {
        paths.include_container()
    };
    let container = doc.create_with_prototype(&container_path)?;
    if options.replace {
        doc.remove_children(container)?;
    }

    for group in groups.iter().filter(|g| !g.is_empty()) {
        for existing in matching_groups(doc, container, group) {
            doc.remove(existing)?;
        }
        if options.exclude {
            doc.import_subtree(container, &group.to_exclude_fragment())?;
        } else {
            let refs = group.refs();
            for other in groups_not_shaped(doc, container, &refs) {
                debug!(dimension = %paths.dimension, "dropping inclusion group of another level");
                doc.remove(other)?;
            }
            doc.import_subtree(container, &group.to_include_fragment())?;
        }
    }

    if options.exclude {
        invert_exclusion(doc, container)?;
    }
    Ok(())
}

/// Rewrite every `And` group of `=` leaves below an exclusion container into
/// its `Or` form and delete the `And` groups.
fn invert_exclusion(doc: &mut XmlDocument, container: NodeId) -> Result<(), ChooserError> {
    let and_groups: Vec<NodeId> = doc
        .children(container)
        .iter()
        .copied()
        .filter(|c| doc.name(*c) == Some("And"))
        .collect();

    for and_group in and_groups {
        let leaves: Vec<Expression> = doc
            .children(and_group)
            .iter()
            .filter(|c| doc.name(**c) == Some(EXPRESSION))
            .map(|c| Expression::read(doc, *c))
            .filter(|e| e.op == Op::Eq && e.value.is_some())
            .collect();
        if !leaves.is_empty() {
            let group = SelectionGroup { expressions: leaves };
            doc.import_subtree(container, &group.to_exclude_fragment())?;
        }
        doc.remove(and_group)?;
    }
    Ok(())
}

/// Remove groups equal to one of `groups` from the inclusion or exclusion
/// container. A group matches only with the same arity and the same
/// `(bRef, value)` set. Containers left empty are removed. Returns the number
/// of removed groups.
pub fn remove_selection(
    doc: &mut XmlDocument,
    paths: &DimensionPaths,
    groups: &[SelectionGroup],
    exclude: bool,
) -> Result<usize, ChooserError> {
    let container_path = if exclude {
        paths.exclude_container()
    } else {
        paths.include_container()
    };
    let Some(container) = doc.select_node(&container_path) else {
        return Ok(0);
    };

    let mut removed = 0;
    for group in groups {
        for existing in matching_groups(doc, container, group) {
            doc.remove(existing)?;
            removed += 1;
        }
    }
    if doc.children(container).is_empty() {
        doc.remove(container)?;
    }
    Ok(removed)
}

/// Remove both containers of the dimension.
pub fn clear_dimension(doc: &mut XmlDocument, paths: &DimensionPaths) -> Result<usize, ChooserError> {
    let mut removed = doc.remove_path(&paths.include_container())?;
    removed += doc.remove_path(&paths.exclude_container())?;
    Ok(removed)
}

/// Drop inclusion groups whose bRef set differs from `refs`. Returns the
/// number of removed groups.
pub fn prune_mismatched_groups(
    doc: &mut XmlDocument,
    paths: &DimensionPaths,
    refs: &BTreeSet<String>,
) -> Result<usize, ChooserError> {
    let Some(container) = doc.select_node(&paths.include_container()) else {
        return Ok(0);
    };
    let alien = groups_not_shaped(doc, container, refs);
    for group in &alien {
        doc.remove(*group)?;
    }
    Ok(alien.len())
}

fn groups_not_shaped(doc: &XmlDocument, container: NodeId, refs: &BTreeSet<String>) -> Vec<NodeId> {
    doc.children(container)
        .iter()
        .copied()
        .filter(|g| SelectionGroup::read(doc, *g).refs() != *refs)
        .collect()
}

fn matching_groups(doc: &XmlDocument, container: NodeId, group: &SelectionGroup) -> Vec<NodeId> {
    doc.children(container)
        .iter()
        .copied()
        .filter(|g| SelectionGroup::read(doc, *g).same_selection(group))
        .collect()
}

/// The document functions bound to one model, firing once per operation.
#[derive(Debug, Clone)]
pub struct FilterMerger {
    pub model_id: String,
    pub paths: DimensionPaths,
}

impl FilterMerger {
    pub fn new(model_id: &str, paths: DimensionPaths) -> Self {
        Self {
            model_id: model_id.to_string(),
            paths,
        }
    }

    pub fn add_selection(
        &self,
        ws: &mut Workspace,
        origin: Option<ChangeOrigin>,
        groups: &[SelectionGroup],
        options: MergeOptions,
    ) -> Result<FireReport, ChooserError> {
        let paths = &self.paths;
        let ((), report) = ws.try_update(&self.model_id, origin, |doc| add_selection(doc, paths, groups, options))?;
        Ok(report)
    }

    pub fn remove_selection(
        &self,
        ws: &mut Workspace,
        origin: Option<ChangeOrigin>,
        groups: &[SelectionGroup],
        exclude: bool,
    ) -> Result<(usize, FireReport), ChooserError> {
        let paths = &self.paths;
        ws.try_update(&self.model_id, origin, |doc| remove_selection(doc, paths, groups, exclude))
    }

    pub fn clear(&self, ws: &mut Workspace, origin: Option<ChangeOrigin>) -> Result<(usize, FireReport), ChooserError> {
        let paths = &self.paths;
        ws.try_update(&self.model_id, origin, |doc| clear_dimension(doc, paths))
    }

    /// Drop inclusion groups not shaped like `refs`. Fires only when a group
    /// was removed.
    pub fn prune(
        &self,
        ws: &mut Workspace,
        origin: Option<ChangeOrigin>,
        refs: &BTreeSet<String>,
    ) -> Result<(usize, Option<FireReport>), ChooserError> {
        let pruned = prune_mismatched_groups(ws.document_mut(&self.model_id)?, &self.paths, refs)?;
        if pruned == 0 {
            return Ok((0, None));
        }
        let fired = ws.fire_as(&self.model_id, origin)?;
        Ok((pruned, Some(fired)))
    }

    /// Heal floating leaves. Fires only when something changed.
    pub fn clean(
        &self,
        ws: &mut Workspace,
        origin: Option<ChangeOrigin>,
        hierarchy: &Hierarchy,
    ) -> Result<(CleanupReport, Option<FireReport>), ChooserError> {
        let report = clean_floating_fragments(ws.document_mut(&self.model_id)?, &self.paths, hierarchy)?;
        if !report.changed() {
            return Ok((report, None));
        }
        let fired = ws.fire_as(&self.model_id, origin)?;
        Ok((report, Some(fired)))
    }
}
