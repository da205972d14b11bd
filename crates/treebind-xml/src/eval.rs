//! Path evaluator.

use std::collections::HashSet;

use crate::document::{NodeId, XmlDocument};
use crate::types::*;

/// Context node during evaluation. The document node only appears as the
/// start of absolute paths and as the parent of the root element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Document,
    Item(XmlItem),
}

/// Path evaluator.
pub struct PathEval;

impl PathEval {
    /// Evaluate `path`; relative paths start at `context`.
    ///
    /// Results are deduplicated and returned in document order.
    pub fn eval(doc: &XmlDocument, path: &Path, context: NodeId) -> Vec<XmlItem> {
        let start = if path.absolute {
            Node::Document
        } else {
            Node::Item(XmlItem::Element(context))
        };
        let nodes = Self::eval_nodes(doc, path, start);
        let mut items: Vec<XmlItem> = nodes
            .into_iter()
            .filter_map(|n| match n {
                Node::Item(item) => Some(item),
                Node::Document => None,
            })
            .collect();
        if items.len() > 1 {
            Self::sort_document_order(doc, &mut items);
        }
        items
    }

    fn eval_nodes(doc: &XmlDocument, path: &Path, start: Node) -> Vec<Node> {
        let mut current = vec![start];

        for step in &path.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for node in &current {
                for found in Self::eval_step(doc, step, node) {
                    if seen.insert(found.clone()) {
                        next.push(found);
                    }
                }
            }
            current = next;
        }

        current
    }

    fn eval_step(doc: &XmlDocument, step: &Step, node: &Node) -> Vec<Node> {
        let mut candidates = Self::axis_nodes(doc, step, node);

        for predicate in &step.predicates {
            candidates = candidates
                .into_iter()
                .enumerate()
                .filter(|(i, candidate)| Self::eval_predicate(doc, predicate, candidate, i + 1))
                .map(|(_, candidate)| candidate)
                .collect();
        }

        candidates
    }

    fn axis_nodes(doc: &XmlDocument, step: &Step, node: &Node) -> Vec<Node> {
        let test = &step.test;
        let element_node = |id: NodeId| Node::Item(XmlItem::Element(id));
        let name_matches = |id: NodeId| doc.name(id).is_some_and(|n| test.matches(n));

        match (step.axis, node) {
            (Axis::Child, Node::Document) => {
                let root = doc.root();
                if name_matches(root) {
                    vec![element_node(root)]
                } else {
                    Vec::new()
                }
            }
            (Axis::Child, Node::Item(XmlItem::Element(id))) => doc
                .children(*id)
                .iter()
                .copied()
                .filter(|c| name_matches(*c))
                .map(element_node)
                .collect(),
            (Axis::Descendant, Node::Document) | (Axis::DescendantOrSelf, Node::Document) => {
                let mut out = Vec::new();
                Self::collect_descendants(doc, doc.root(), true, &name_matches, &mut out);
                out.into_iter().map(element_node).collect()
            }
            (Axis::Descendant, Node::Item(XmlItem::Element(id))) => {
                let mut out = Vec::new();
                Self::collect_descendants(doc, *id, false, &name_matches, &mut out);
                out.into_iter().map(element_node).collect()
            }
            (Axis::DescendantOrSelf, Node::Item(XmlItem::Element(id))) => {
                let mut out = Vec::new();
                Self::collect_descendants(doc, *id, true, &name_matches, &mut out);
                out.into_iter().map(element_node).collect()
            }
            (Axis::Attribute, Node::Item(XmlItem::Element(id))) => doc
                .attributes(*id)
                .filter(|(name, _)| test.matches(name))
                .map(|(name, _)| {
                    Node::Item(XmlItem::Attribute {
                        owner: *id,
                        name: name.to_string(),
                    })
                })
                .collect(),
            (Axis::Parent, Node::Item(XmlItem::Element(id))) => match doc.parent(*id) {
                Some(parent) if name_matches(parent) => vec![element_node(parent)],
                Some(_) => Vec::new(),
                None if *id == doc.root() && *test == NodeTest::Any => vec![Node::Document],
                None => Vec::new(),
            },
            (Axis::Parent, Node::Item(XmlItem::Attribute { owner, .. })) => {
                if name_matches(*owner) {
                    vec![element_node(*owner)]
                } else {
                    Vec::new()
                }
            }
            (Axis::SelfNode, Node::Document) => {
                if *test == NodeTest::Any {
                    vec![Node::Document]
                } else {
                    Vec::new()
                }
            }
            (Axis::SelfNode, Node::Item(item)) => {
                let matches = match item {
                    XmlItem::Element(id) => name_matches(*id),
                    XmlItem::Attribute { name, .. } => test.matches(name),
                };
                if matches {
                    vec![node.clone()]
                } else {
                    Vec::new()
                }
            }
            (Axis::Ancestor, Node::Item(item)) | (Axis::AncestorOrSelf, Node::Item(item)) => {
                let mut out = Vec::new();
                let mut current = match item {
                    XmlItem::Element(id) if step.axis == Axis::AncestorOrSelf => Some(*id),
                    XmlItem::Element(id) => doc.parent(*id),
                    XmlItem::Attribute { owner, .. } => Some(*owner),
                };
                while let Some(id) = current {
                    if name_matches(id) {
                        out.push(element_node(id));
                    }
                    current = doc.parent(id);
                }
                out
            }
            _ => Vec::new(),
        }
    }

    fn collect_descendants(
        doc: &XmlDocument,
        id: NodeId,
        include_self: bool,
        matches: &dyn Fn(NodeId) -> bool,
        out: &mut Vec<NodeId>,
    ) {
        if include_self && matches(id) {
            out.push(id);
        }
        for child in doc.children(id) {
            Self::collect_descendants(doc, *child, true, matches, out);
        }
    }

    fn eval_predicate(doc: &XmlDocument, predicate: &Predicate, node: &Node, position: usize) -> bool {
        match predicate {
            Predicate::Position(n) => *n == position,
            Predicate::Exists(path) => !Self::eval_relative(doc, path, node).is_empty(),
            Predicate::And(l, r) => {
                Self::eval_predicate(doc, l, node, position) && Self::eval_predicate(doc, r, node, position)
            }
            Predicate::Or(l, r) => {
                Self::eval_predicate(doc, l, node, position) || Self::eval_predicate(doc, r, node, position)
            }
            Predicate::Not(inner) => !Self::eval_predicate(doc, inner, node, position),
            Predicate::Compare { op, left, right } => {
                let left = Self::operand_values(doc, left, node);
                let right = Self::operand_values(doc, right, node);
                // General comparison: true if any pair satisfies the operator.
                left.iter().any(|l| {
                    right.iter().any(|r| match op {
                        CompareOp::Equal => l == r,
                        CompareOp::NotEqual => l != r,
                    })
                })
            }
        }
    }

    fn eval_relative(doc: &XmlDocument, path: &Path, node: &Node) -> Vec<Node> {
        let start = if path.absolute {
            Node::Document
        } else {
            node.clone()
        };
        Self::eval_nodes(doc, path, start)
    }

    fn operand_values(doc: &XmlDocument, operand: &Operand, node: &Node) -> Vec<String> {
        match operand {
            Operand::Literal(s) => vec![s.clone()],
            Operand::Path(path) => Self::eval_relative(doc, path, node)
                .iter()
                .filter_map(|n| match n {
                    Node::Document => Some(doc.string_value(doc.root())),
                    Node::Item(item) => doc.item_value(item),
                })
                .collect(),
        }
    }

    fn sort_document_order(doc: &XmlDocument, items: &mut [XmlItem]) {
        let order = doc.document_order();
        let key = |item: &XmlItem| -> (usize, usize) {
            let owner_pos = order.get(&item.owner()).copied().unwrap_or(usize::MAX);
            match item {
                XmlItem::Element(_) => (owner_pos, 0),
                XmlItem::Attribute { owner, name } => {
                    let attr_pos = doc
                        .attributes(*owner)
                        .position(|(n, _)| n == name)
                        .unwrap_or(0);
                    (owner_pos, attr_pos + 1)
                }
            }
        };
        items.sort_by_key(key);
    }
}
