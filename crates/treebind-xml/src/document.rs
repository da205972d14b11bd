//! Arena-backed mutable XML document.
//!
//! Elements live in a flat arena and are addressed by [`NodeId`]. Removing
//! an element only detaches it: ids handed out earlier stay valid but the
//! node is no longer reachable from the root, which is what
//! [`XmlDocument::is_attached`] reports. [`XmlDocument::purge_detached`]
//! hands the slots of detached elements back to the arena; each slot carries
//! a generation so that an id of a purged element never resolves to the
//! element later stored in the same slot.
//!
//! Text content is kept per element. Mixed content is normalized to "own text
//! first, then child elements", which is all the filter and option documents
//! this crate is used for ever contain.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::codec;
use crate::error::XmlError;
use crate::eval::PathEval;
use crate::fragment::XmlFragment;
use crate::parser::PathParser;
use crate::types::{Axis, CompareOp, NodeTest, Operand, Path, Predicate, XmlItem};

/// Handle of an element inside one [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) text: Option<String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl Element {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            parent,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// Mutable, ordered XML tree with path selection.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    revision: u64,
}

impl XmlDocument {
    /// Create a document holding a single empty root element.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Slot {
                generation: 0,
                element: Some(Element::new(root_name, None)),
            }],
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            revision: 0,
        }
    }

    /// Parse XML text.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        codec::parse_document(xml)
    }

    /// Build a document whose root is a copy of `fragment`.
    pub fn from_fragment(fragment: &XmlFragment) -> Self {
        let mut doc = Self::new(&fragment.name);
        let root = doc.root;
        doc.fill_from_fragment(root, fragment);
        doc.revision = 0;
        doc
    }

    /// Serialize the whole document.
    pub fn to_xml_string(&self) -> String {
        codec::write_element(self, self.root)
    }

    /// Serialize one element and its subtree.
    pub fn serialize_node(&self, id: NodeId) -> Option<String> {
        self.element(id)?;
        Some(codec::write_element(self, id))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Monotonic counter bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn reset_revision(&mut self) {
        self.revision = 0;
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)?
            .element
            .as_ref()
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, XmlError> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_mut())
            .ok_or(XmlError::UnknownNode)
    }

    /// Number of elements held by the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.element.is_some()).count()
    }

    /// Number of arena slots, free ones included.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    fn allocate(&mut self, element: Element) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.element = Some(element);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Slot {
                    generation: 0,
                    element: Some(element),
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// Release every element not reachable from the root. Ids of released
    /// elements stop resolving. Returns the number of released elements.
    pub fn purge_detached(&mut self) -> usize {
        let attached = self.document_order();
        let mut released = 0;
        for (index, slot) in self.nodes.iter_mut().enumerate() {
            let id = NodeId {
                index,
                generation: slot.generation,
            };
            if slot.element.is_some() && !attached.contains_key(&id) {
                slot.element = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
                released += 1;
            }
        }
        released
    }

    // ── Read access ─────────────────────────────────────────────────────

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.element(id)
            .into_iter()
            .flat_map(|e| e.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// The element's own text, without descendants.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.element(id)?.text.as_deref()
    }

    /// XPath string value: own text followed by the string values of all children.
    pub fn string_value(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(e) = self.element(id) {
            if let Some(text) = &e.text {
                out.push_str(text);
            }
            for child in &e.children {
                self.collect_text(*child, out);
            }
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id)?.parent
    }

    /// True when the element is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// True when `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Preorder positions of all attached elements.
    pub(crate) fn document_order(&self) -> HashMap<NodeId, usize> {
        let mut order = HashMap::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.insert(id, order.len());
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    // ── Mutation ────────────────────────────────────────────────────────

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), XmlError> {
        self.element_mut(id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        self.revision += 1;
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, XmlError> {
        let removed = self.element_mut(id)?.attributes.shift_remove(name);
        if removed.is_some() {
            self.revision += 1;
        }
        Ok(removed)
    }

    pub fn set_text(&mut self, id: NodeId, text: Option<&str>) -> Result<(), XmlError> {
        self.element_mut(id)?.text = text.map(str::to_string);
        self.revision += 1;
        Ok(())
    }

    pub(crate) fn append_text(&mut self, id: NodeId, text: &str) -> Result<(), XmlError> {
        let element = self.element_mut(id)?;
        element.text.get_or_insert_with(String::new).push_str(text);
        self.revision += 1;
        Ok(())
    }

    /// Append a new empty element as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, XmlError> {
        self.element_mut(parent)?;
        let id = self.allocate(Element::new(name, Some(parent)));
        self.element_mut(parent)?.children.push(id);
        self.revision += 1;
        Ok(id)
    }

    /// Detach an element (and its subtree) from its parent.
    pub fn remove(&mut self, id: NodeId) -> Result<(), XmlError> {
        if id == self.root {
            return Err(XmlError::RootRemoval);
        }
        let parent = self.element_mut(id)?.parent.take();
        if let Some(parent) = parent {
            self.element_mut(parent)?.children.retain(|c| *c != id);
        }
        self.revision += 1;
        Ok(())
    }

    pub fn remove_children(&mut self, id: NodeId) -> Result<(), XmlError> {
        let children = std::mem::take(&mut self.element_mut(id)?.children);
        for child in children {
            self.element_mut(child)?.parent = None;
        }
        self.revision += 1;
        Ok(())
    }

    /// Owned deep copy of a subtree, for moving content between documents.
    pub fn export_subtree(&self, id: NodeId) -> Option<XmlFragment> {
        let e = self.element(id)?;
        Some(XmlFragment {
            name: e.name.clone(),
            attributes: e.attributes.clone(),
            text: e.text.clone(),
            children: e
                .children
                .iter()
                .filter_map(|c| self.export_subtree(*c))
                .collect(),
        })
    }

    /// Append a deep copy of `fragment` under `parent`.
    pub fn import_subtree(&mut self, parent: NodeId, fragment: &XmlFragment) -> Result<NodeId, XmlError> {
        let id = self.append_child(parent, &fragment.name)?;
        self.fill_from_fragment(id, fragment);
        Ok(id)
    }

    fn fill_from_fragment(&mut self, id: NodeId, fragment: &XmlFragment) {
        if let Ok(e) = self.element_mut(id) {
            e.attributes = fragment.attributes.clone();
            e.text = fragment.text.clone();
        }
        for child in &fragment.children {
            if let Ok(child_id) = self.append_child(id, &child.name) {
                self.fill_from_fragment(child_id, child);
            }
        }
        self.revision += 1;
    }

    // ── Selection ───────────────────────────────────────────────────────

    /// Evaluate a path; relative paths start at the root element.
    pub fn select(&self, path: &Path) -> Vec<XmlItem> {
        PathEval::eval(self, path, self.root)
    }

    /// Evaluate a path; relative paths start at `context`.
    pub fn select_from(&self, context: NodeId, path: &Path) -> Vec<XmlItem> {
        PathEval::eval(self, path, context)
    }

    /// Parse and evaluate a path expression.
    pub fn select_str(&self, path: &str) -> Result<Vec<XmlItem>, XmlError> {
        let path = PathParser::parse(path)?;
        Ok(self.select(&path))
    }

    /// Elements selected by `path`; attribute items are dropped.
    pub fn select_nodes(&self, path: &Path) -> Vec<NodeId> {
        self.select(path).iter().filter_map(XmlItem::as_element).collect()
    }

    pub fn select_nodes_from(&self, context: NodeId, path: &Path) -> Vec<NodeId> {
        self.select_from(context, path)
            .iter()
            .filter_map(XmlItem::as_element)
            .collect()
    }

    /// First element selected by `path`.
    pub fn select_node(&self, path: &Path) -> Option<NodeId> {
        self.select(path).iter().find_map(XmlItem::as_element)
    }

    pub fn select_node_from(&self, context: NodeId, path: &Path) -> Option<NodeId> {
        self.select_from(context, path).iter().find_map(XmlItem::as_element)
    }

    /// String value of an element or attribute item.
    pub fn item_value(&self, item: &XmlItem) -> Option<String> {
        match item {
            XmlItem::Element(id) => self.element(*id).map(|_| self.string_value(*id)),
            XmlItem::Attribute { owner, name } => self.attribute(*owner, name).map(str::to_string),
        }
    }

    /// String value of the first selected item.
    pub fn value_of(&self, path: &Path) -> Option<String> {
        self.select(path).first().and_then(|i| self.item_value(i))
    }

    pub fn value_of_from(&self, context: NodeId, path: &Path) -> Option<String> {
        self.select_from(context, path)
            .first()
            .and_then(|i| self.item_value(i))
    }

    /// Serialized form of everything `path` selects; equal snapshots mean an
    /// unchanged selection.
    pub fn snapshot(&self, path: &Path) -> String {
        let mut out = String::new();
        for item in self.select(path) {
            match &item {
                XmlItem::Element(id) => out.push_str(&codec::write_element(self, *id)),
                XmlItem::Attribute { owner, name } => {
                    out.push('@');
                    out.push_str(name);
                    out.push('=');
                    out.push_str(self.attribute(*owner, name).unwrap_or_default());
                }
            }
            out.push('\n');
        }
        out
    }

    // ── Path-driven mutation ────────────────────────────────────────────

    /// Return the element addressed by `path`, creating every missing element
    /// along the way. Attribute-equality predicates on a created step become
    /// attributes of the new element. A trailing `@attr` step makes sure the
    /// attribute exists and returns its owner.
    pub fn create_with_prototype(&mut self, path: &Path) -> Result<NodeId, XmlError> {
        let start = if path.absolute { None } else { Some(self.root) };
        self.create_from(start, path)
    }

    /// Like [`create_with_prototype`](Self::create_with_prototype) with relative
    /// paths starting at `context`.
    pub fn create_with_prototype_from(&mut self, context: NodeId, path: &Path) -> Result<NodeId, XmlError> {
        let start = if path.absolute { None } else { Some(context) };
        self.create_from(start, path)
    }

    fn create_from(&mut self, start: Option<NodeId>, path: &Path) -> Result<NodeId, XmlError> {
        // `None` stands for the document node.
        let mut current = start;

        for (i, step) in path.steps.iter().enumerate() {
            let is_last = i + 1 == path.steps.len();
            match step.axis {
                Axis::Attribute => {
                    let (NodeTest::Name(name), true) = (&step.test, is_last) else {
                        return Err(XmlError::NotPrototypable(path.to_string()));
                    };
                    let owner = current.unwrap_or(self.root);
                    if self.attribute(owner, name).is_none() {
                        self.set_attribute(owner, name, "")?;
                    }
                    return Ok(owner);
                }
                Axis::SelfNode if step.predicates.is_empty() => {}
                Axis::Parent if step.predicates.is_empty() => {
                    current = match current {
                        Some(id) => self.parent(id),
                        None => return Err(XmlError::NotPrototypable(path.to_string())),
                    };
                }
                Axis::Child => {
                    let single = Path {
                        absolute: current.is_none(),
                        steps: vec![step.clone()],
                    };
                    let existing = match current {
                        Some(id) => self.select_node_from(id, &single),
                        None => self.select_node(&single),
                    };
                    if let Some(found) = existing {
                        current = Some(found);
                        continue;
                    }

                    let NodeTest::Name(name) = &step.test else {
                        return Err(XmlError::NotPrototypable(path.to_string()));
                    };
                    let mut seeded = Vec::new();
                    for predicate in &step.predicates {
                        if !prototype_attributes(predicate, &mut seeded) {
                            return Err(XmlError::NotPrototypable(path.to_string()));
                        }
                    }
                    let parent = match current {
                        Some(id) => id,
                        None => {
                            return Err(XmlError::RootMismatch {
                                expected: name.clone(),
                                found: self.name(self.root).unwrap_or_default().to_string(),
                            });
                        }
                    };
                    let created = self.append_child(parent, name)?;
                    for (attr, value) in seeded {
                        self.set_attribute(created, &attr, &value)?;
                    }
                    current = Some(created);
                }
                _ => return Err(XmlError::NotPrototypable(path.to_string())),
            }
        }

        Ok(current.unwrap_or(self.root))
    }

    /// Write `value` to the attribute or element text addressed by `path`,
    /// creating missing nodes first.
    pub fn set_value(&mut self, path: &Path, value: &str) -> Result<NodeId, XmlError> {
        let owner = self.create_with_prototype(path)?;
        self.write_value(owner, path, value)?;
        Ok(owner)
    }

    pub fn set_value_from(&mut self, context: NodeId, path: &Path, value: &str) -> Result<NodeId, XmlError> {
        let owner = self.create_with_prototype_from(context, path)?;
        self.write_value(owner, path, value)?;
        Ok(owner)
    }

    fn write_value(&mut self, owner: NodeId, path: &Path, value: &str) -> Result<(), XmlError> {
        match path.steps.last() {
            Some(step) if step.axis == Axis::Attribute => {
                if let NodeTest::Name(name) = &step.test {
                    self.set_attribute(owner, name, value)?;
                }
                Ok(())
            }
            _ => self.set_text(owner, Some(value)),
        }
    }

    /// Remove every element and attribute selected by `path`. Returns the
    /// number of removed items. The root element is never removed.
    pub fn remove_path(&mut self, path: &Path) -> Result<usize, XmlError> {
        let mut removed = 0;
        for item in self.select(path) {
            match item {
                XmlItem::Element(id) if id == self.root => {}
                XmlItem::Element(id) => {
                    self.remove(id)?;
                    removed += 1;
                }
                XmlItem::Attribute { owner, name } => {
                    if self.remove_attribute(owner, &name)?.is_some() {
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }
}

impl PartialEq for XmlDocument {
    /// Structural equality of the attached trees; arena layout and revision are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.export_subtree(self.root) == other.export_subtree(other.root)
    }
}

/// Collect `@attr='value'` pairs from a predicate made of equalities and `and`.
fn prototype_attributes(predicate: &Predicate, out: &mut Vec<(String, String)>) -> bool {
    match predicate {
        Predicate::And(l, r) => prototype_attributes(l, out) && prototype_attributes(r, out),
        Predicate::Position(1) => true,
        Predicate::Compare {
            op: CompareOp::Equal,
            left,
            right,
        } => match (left, right) {
            (Operand::Path(p), Operand::Literal(v)) | (Operand::Literal(v), Operand::Path(p)) => {
                match attribute_name(p) {
                    Some(name) => {
                        out.push((name.to_string(), v.clone()));
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        },
        _ => false,
    }
}

fn attribute_name(path: &Path) -> Option<&str> {
    match path.steps.as_slice() {
        [step] if step.axis == Axis::Attribute && step.predicates.is_empty() => match &step.test {
            NodeTest::Name(n) => Some(n),
            NodeTest::Any => None,
        },
        _ => None,
    }
}
