//! The chooser's own staging document.
//!
//! ```text
//! <Chooser level="station">
//!   <Edit><And><Expression .../></And></Edit>
//!   <Inputs><Input level="country"/><Input level="station"/></Inputs>
//!   <Multi open="false"/>
//! </Chooser>
//! ```

use treebind_xml::{Path, XmlDocument, XmlError, XmlFragment};

use crate::filter::{Expression, SelectionGroup, EXPRESSION};

fn chooser() -> Path {
    Path::root().child("Chooser")
}

fn edit() -> Path {
    chooser().child("Edit")
}

fn inputs() -> Path {
    chooser().child("Inputs")
}

fn multi() -> Path {
    chooser().child("Multi")
}

/// Path of the staged value of one bRef.
pub fn edit_value_path(b_ref: &str) -> Path {
    edit().child("And").child(EXPRESSION).where_attr("bRef", b_ref).attr("value")
}

pub fn new_document() -> XmlDocument {
    XmlDocument::from_fragment(
        &XmlFragment::new("Chooser")
            .attr("level", "")
            .child(XmlFragment::new("Edit"))
            .child(XmlFragment::new("Inputs"))
            .child(XmlFragment::new("Multi").attr("open", "false")),
    )
}

pub fn level(doc: &XmlDocument) -> String {
    doc.value_of(&chooser().attr("level")).unwrap_or_default()
}

pub fn set_level(doc: &mut XmlDocument, level: &str) -> Result<(), XmlError> {
    doc.set_value(&chooser().attr("level"), level)?;
    Ok(())
}

pub fn edit_group(doc: &XmlDocument) -> SelectionGroup {
    match doc.select_node(&edit().child("And")) {
        Some(group) => SelectionGroup::read(doc, group),
        None => SelectionGroup::new(),
    }
}

/// Drop the staged group and optionally stage a copy of `group`. Nothing
/// is touched when the staged content already equals it.
pub fn replace_edit_group(doc: &mut XmlDocument, group: Option<&SelectionGroup>) -> Result<(), XmlError> {
    let edit = doc.create_with_prototype(&edit())?;
    let wanted: Vec<XmlFragment> = group.map(|g| g.to_include_fragment()).into_iter().collect();
    let current: Vec<XmlFragment> = doc
        .children(edit)
        .iter()
        .filter_map(|c| doc.export_subtree(*c))
        .collect();
    if current == wanted {
        return Ok(());
    }
    doc.remove_children(edit)?;
    doc.purge_detached();
    for fragment in &wanted {
        doc.import_subtree(edit, fragment)?;
    }
    Ok(())
}

/// Stage `expression`, replacing the leaf with the same bRef.
pub fn set_edit_expression(doc: &mut XmlDocument, expression: &Expression) -> Result<(), XmlError> {
    let path = edit().child("And").child(EXPRESSION).where_attr("bRef", &expression.b_ref);
    let leaf = doc.create_with_prototype(&path)?;
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

pub fn remove_edit_expression(doc: &mut XmlDocument, b_ref: &str) -> Result<usize, XmlError> {
    let removed = doc.remove_path(&edit().child("And").child(EXPRESSION).where_attr("bRef", b_ref))?;
    if removed > 0 {
        doc.purge_detached();
    }
    Ok(removed)
}

pub fn input_levels(doc: &XmlDocument) -> Vec<String> {
    doc.select(&inputs().child("Input").attr("level"))
        .iter()
        .filter_map(|i| doc.item_value(i))
        .collect()
}

/// Set the input rows to `levels`, keeping the rows already in place.
pub fn set_input_levels(doc: &mut XmlDocument, levels: &[String]) -> Result<(), XmlError> {
    if input_levels(doc) == levels {
        return Ok(());
    }
    let inputs = doc.create_with_prototype(&inputs())?;
    let rows = doc.children(inputs).to_vec();
    for (i, level) in levels.iter().enumerate() {
        let row = match rows.get(i) {
            Some(row) => *row,
            None => doc.append_child(inputs, "Input")?,
        };
        if doc.attribute(row, "level") != Some(level.as_str()) {
            doc.set_attribute(row, "level", level)?;
        }
    }
    if rows.len() > levels.len() {
        for row in &rows[levels.len()..] {
            doc.remove(*row)?;
        }
        doc.purge_detached();
    }
    Ok(())
}

pub fn multi_open(doc: &XmlDocument) -> bool {
    doc.value_of(&multi().attr("open")).as_deref() == Some("true")
}

pub fn set_multi_open(doc: &mut XmlDocument, open: bool) -> Result<(), XmlError> {
    doc.set_value(&multi().attr("open"), if open { "true" } else { "false" })?;
    Ok(())
}
