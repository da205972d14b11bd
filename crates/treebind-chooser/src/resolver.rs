//! Active-level resolution, staging reconciliation and healing of filter
//! leaves written outside a dimension container.

use std::collections::HashSet;

use tracing::debug;
use treebind_xml::{NodeId, Path, XmlDocument};

use crate::error::ChooserError;
use crate::filter::{DimensionPaths, Expression, FilterState, SelectionGroup, EXCLUDE_ATTR, EXPRESSION, INCLUDE_ATTR};
use crate::hierarchy::Hierarchy;
use crate::staging;

/// The level whose required bRef set equals the bRef set of the first
/// inclusion group, or `""` when no level matches.
///
/// Levels are tested in declaration order and the first match wins.
pub fn guess_active_level(filter: &FilterState, hierarchy: &Hierarchy) -> Result<String, ChooserError> {
    let Some(first) = filter.first_included() else {
        return Ok(String::new());
    };
    let refs = first.refs();
    for level in &hierarchy.levels {
        if hierarchy.required_refs(&level.id)? == refs {
            return Ok(level.id.clone());
        }
    }
    Ok(String::new())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub active_level: String,
    /// Levels whose input controls have to be created, in chain order.
    pub created: Vec<String>,
    /// Levels whose input controls have to be destroyed.
    pub destroyed: Vec<String>,
    pub multi_open: bool,
}

/// Bring the staging document in line with `filter` for `level`.
///
/// 1. The staged edit group is replaced by the first inclusion group, or
///    dropped when there is none. Without inclusions but with exclusions
///    the active level becomes `""`.
/// 2. Unchanged staging content is left alone.
/// 3. Inputs are set to exactly the required chain of the active level;
///    the outcome lists which input controls appear and disappear.
/// 4. The multi area is open for several inclusions or any exclusion.
///
/// Running it twice in a row leaves the staging document unchanged.
pub fn reconcile(
    staging_doc: &mut XmlDocument,
    filter: &FilterState,
    level: &str,
    hierarchy: &Hierarchy,
) -> Result<ReconcileOutcome, ChooserError> {
    let first = filter.first_included();
    staging::replace_edit_group(staging_doc, first)?;

    let mut active_level = level.to_string();
    if first.is_none() && !filter.excluded.is_empty() {
        active_level.clear();
    }

    let chain = if active_level.is_empty() {
        Vec::new()
    } else {
        hierarchy.required_chain_ids(&active_level)?
    };
    let (created, destroyed) = diff_inputs(&staging::input_levels(staging_doc), &chain);
    staging::set_input_levels(staging_doc, &chain)?;
    staging::set_level(staging_doc, &active_level)?;

    let multi_open = filter.is_multi();
    staging::set_multi_open(staging_doc, multi_open)?;

    Ok(ReconcileOutcome {
        active_level,
        created,
        destroyed,
        multi_open,
    })
}

/// Levels to create and to destroy when going from `existing` to `chain`.
pub fn diff_inputs(existing: &[String], chain: &[String]) -> (Vec<String>, Vec<String>) {
    let created = chain.iter().filter(|l| !existing.contains(l)).cloned().collect();
    let destroyed = existing.iter().filter(|l| !chain.contains(l)).cloned().collect();
    (created, destroyed)
}

/// What [`clean_floating_fragments`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Groups written into the inclusion container from floating leaves.
    pub folded: usize,
    /// Floating leaves discarded without being folded.
    pub deleted: usize,
    /// Elements removed by the final sweep, empty wrappers included.
    pub removed: usize,
}

impl CleanupReport {
    pub fn changed(&self) -> bool {
        self.folded > 0 || self.removed > 0
    }
}

enum Fold {
    Created,
    Overwritten,
    Replaced,
    Ambiguous,
}

/// Heal filter leaves of this hierarchy that sit outside any dimension
/// container, typically written by another component.
///
/// Levels are processed deepest chain first. The ancestors of a floating
/// leaf are taken from other floating leaves or, failing that, from the
/// single existing inclusion group. A leaf with an ancestor found in neither
/// place is deleted. Otherwise the chain is folded into the inclusion
/// container with each leaf's operator kept: a missing container is
/// created, a single group with the same bRefs is overwritten in place, a
/// single group of another shape is replaced, and several groups make the
/// target ambiguous, in which case the leaves are only deleted. All consumed
/// leaves are removed in one sweep, followed by wrappers left empty.
pub fn clean_floating_fragments(
    doc: &mut XmlDocument,
    paths: &DimensionPaths,
    hierarchy: &Hierarchy,
) -> Result<CleanupReport, ChooserError> {
    let mut report = CleanupReport::default();
    let Some(filter) = doc.select_node(&paths.filter) else {
        return Ok(report);
    };

    let known = hierarchy.b_refs();
    let floating: Vec<(NodeId, String)> = doc
        .select_nodes_from(filter, &Path::relative().descendant(EXPRESSION))
        .into_iter()
        .filter(|n| !inside_container(doc, filter, *n))
        .filter_map(|n| {
            let b_ref = doc.attribute(n, "bRef")?;
            known.contains(b_ref).then(|| (n, b_ref.to_string()))
        })
        .collect();
    if floating.is_empty() {
        return Ok(report);
    }

    let mut levels = hierarchy
        .levels
        .iter()
        .map(|l| Ok((hierarchy.required_chain(&l.id)?, l)))
        .collect::<Result<Vec<_>, ChooserError>>()?;
    levels.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut marked: HashSet<NodeId> = HashSet::new();
    for (chain, level) in &levels {
        let leaves: Vec<NodeId> = floating
            .iter()
            .filter(|(_, b_ref)| *b_ref == level.b_ref)
            .map(|(n, _)| *n)
            .collect();

        for leaf in leaves {
            if marked.contains(&leaf) {
                continue;
            }

            // Ancestors come from other floating leaves first, then from the
            // single existing inclusion group.
            let mut picked = Vec::with_capacity(chain.len());
            let mut expressions = Vec::with_capacity(chain.len());
            for chain_level in chain {
                let found = if chain_level.id == level.id {
                    Some(leaf)
                } else {
                    floating
                        .iter()
                        .find(|(n, b_ref)| *b_ref == chain_level.b_ref && !marked.contains(n))
                        .map(|(n, _)| *n)
                };
                match found {
                    Some(n) => {
                        picked.push(n);
                        expressions.push(Expression::read(doc, n));
                    }
                    None => match existing_ancestor(doc, paths, &chain_level.b_ref) {
                        Some(expression) => expressions.push(expression),
                        None => break,
                    },
                }
            }

            if expressions.len() < chain.len() {
                debug!(dimension = %paths.dimension, level = %level.id, "floating leaf without its required levels, deleting");
                marked.insert(leaf);
                report.deleted += 1;
                continue;
            }

            let group = SelectionGroup { expressions };
            marked.extend(picked.iter().copied());

            match fold_group(doc, paths, &group)? {
                Fold::Ambiguous => {
                    debug!(dimension = %paths.dimension, level = %level.id, "several groups in target container, deleting floating leaves");
                    report.deleted += picked.len();
                }
                fold => {
                    let how = match fold {
                        Fold::Created => "created",
                        Fold::Overwritten => "overwritten",
                        _ => "replaced",
                    };
                    debug!(dimension = %paths.dimension, level = %level.id, how, "folded floating leaves");
                    report.folded += 1;
                }
            }
        }
    }

    report.removed = sweep(doc, filter, &floating, &marked)?;
    Ok(report)
}

/// The leaf for `b_ref` in the inclusion container, when that container
/// holds exactly one group and the leaf carries a value.
fn existing_ancestor(doc: &XmlDocument, paths: &DimensionPaths, b_ref: &str) -> Option<Expression> {
    match doc.select_nodes(&paths.include_groups()).as_slice() {
        [only] => SelectionGroup::read(doc, *only)
            .expression(b_ref)
            .filter(|e| e.value.is_some())
            .cloned(),
        _ => None,
    }
}

fn inside_container(doc: &XmlDocument, filter: NodeId, node: NodeId) -> bool {
    let mut current = doc.parent(node);
    while let Some(id) = current {
        if id == filter {
            return false;
        }
        if doc.attribute(id, INCLUDE_ATTR).is_some() || doc.attribute(id, EXCLUDE_ATTR).is_some() {
            return true;
        }
        current = doc.parent(id);
    }
    false
}

fn fold_group(doc: &mut XmlDocument, paths: &DimensionPaths, group: &SelectionGroup) -> Result<Fold, ChooserError> {
    let groups = doc.select_nodes(&paths.include_groups());
    let container = match doc.select_node(&paths.include_container()) {
        Some(container) => container,
        None => {
            let container = doc.create_with_prototype(&paths.include_container())?;
            doc.import_subtree(container, &group.to_include_fragment())?;
            return Ok(Fold::Created);
        }
    };

    match groups.as_slice() {
        [] => {
            doc.import_subtree(container, &group.to_include_fragment())?;
            Ok(Fold::Created)
        }
        [existing] => {
            if SelectionGroup::read(doc, *existing).refs() == group.refs() {
                for leaf in doc.children(*existing).to_vec() {
                    if doc.name(leaf) != Some(EXPRESSION) {
                        continue;
                    }
                    let Some(b_ref) = doc.attribute(leaf, "bRef").map(str::to_string) else {
                        continue;
                    };
                    if let Some(expression) = group.expression(&b_ref) {
                        write_leaf(doc, leaf, expression)?;
                    }
                }
                Ok(Fold::Overwritten)
            } else {
                doc.remove(*existing)?;
                doc.import_subtree(container, &group.to_include_fragment())?;
                Ok(Fold::Replaced)
            }
        }
        _ => Ok(Fold::Ambiguous),
    }
}

fn write_leaf(doc: &mut XmlDocument, leaf: NodeId, expression: &Expression) -> Result<(), ChooserError> {
    doc.set_attribute(leaf, "op", expression.op.as_str())?;
    match &expression.value {
        Some(value) => doc.set_attribute(leaf, "value", value)?,
        None => {
            doc.remove_attribute(leaf, "value")?;
        }
    }
    match &expression.caption {
        Some(caption) => doc.set_attribute(leaf, "caption", caption)?,
        None => {
            doc.remove_attribute(leaf, "caption")?;
        }
    }
    Ok(())
}

/// Remove marked leaves, then every ancestor left without children up to the
/// filter element.
fn sweep(
    doc: &mut XmlDocument,
    filter: NodeId,
    floating: &[(NodeId, String)],
    marked: &HashSet<NodeId>,
) -> Result<usize, ChooserError> {
    let mut removed = 0;
    for (leaf, _) in floating.iter().filter(|(n, _)| marked.contains(n)) {
        if !doc.is_attached(*leaf) {
            continue;
        }
        let mut parent = doc.parent(*leaf);
        doc.remove(*leaf)?;
        removed += 1;

        while let Some(id) = parent {
            let is_container = doc.attribute(id, INCLUDE_ATTR).is_some() || doc.attribute(id, EXCLUDE_ATTR).is_some();
            if id == filter || is_container || !doc.children(id).is_empty() || doc.text(id).is_some() {
                break;
            }
            parent = doc.parent(id);
            doc.remove(id)?;
            removed += 1;
        }
    }
    Ok(removed)
}
