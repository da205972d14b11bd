//! Filter fragment value types.
//!
//! A dimension owns two containers below the filter element:
//!
//! ```text
//! Or[@dimension=d]            inclusion: And groups of Expression[@op='='] leaves
//! And[@dimension_exclude=d]   exclusion: Or groups of != leaves plus null companions
//! ```

use std::collections::BTreeSet;

use treebind_xml::{NodeId, Path, XmlDocument, XmlFragment};

pub const INCLUDE_ATTR: &str = "dimension";
pub const EXCLUDE_ATTR: &str = "dimension_exclude";
pub const EXPRESSION: &str = "Expression";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Op {
    #[default]
    Eq,
    Ne,
    Other(String),
}

impl Op {
    pub fn parse(op: &str) -> Self {
        match op {
            "" | "=" => Op::Eq,
            "!=" => Op::Ne,
            other => Op::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Other(op) => op,
        }
    }
}

/// One filter leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub b_ref: String,
    pub op: Op,
    /// `None` on the null companion of an exclusion.
    pub value: Option<String>,
    pub caption: Option<String>,
}

impl Expression {
    pub fn new(b_ref: &str, value: &str) -> Self {
        Self {
            b_ref: b_ref.to_string(),
            op: Op::Eq,
            value: Some(value.to_string()),
            caption: None,
        }
    }

    /// `bRef = null`, paired with every != leaf of an exclusion.
    pub fn null_companion(b_ref: &str) -> Self {
        Self {
            b_ref: b_ref.to_string(),
            op: Op::Eq,
            value: None,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_op(mut self, op: Op) -> Self {
        self.op = op;
        self
    }

    pub fn is_null_companion(&self) -> bool {
        self.op == Op::Eq && self.value.is_none()
    }

    pub fn read(doc: &XmlDocument, node: NodeId) -> Self {
        let attr = |name: &str| doc.attribute(node, name).map(str::to_string);
        Self {
            b_ref: attr("bRef").unwrap_or_default(),
            op: Op::parse(doc.attribute(node, "op").unwrap_or_default()),
            value: attr("value"),
            caption: attr("caption"),
        }
    }

    pub fn to_fragment(&self) -> XmlFragment {
        let mut fragment = XmlFragment::new(EXPRESSION)
            .attr("bRef", &self.b_ref)
            .attr("op", self.op.as_str());
        if let Some(value) = &self.value {
            fragment = fragment.attr("value", value);
        }
        if let Some(caption) = &self.caption {
            fragment = fragment.attr("caption", caption);
        }
        fragment
    }
}

/// A conjunction of leaves, one selected tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionGroup {
    pub expressions: Vec<Expression>,
}

impl SelectionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`push`](Self::push) for `bRef = value` leaves.
    pub fn with(mut self, b_ref: &str, value: &str) -> Self {
        self.push(Expression::new(b_ref, value));
        self
    }

    pub fn push(&mut self, expression: Expression) {
        self.expressions.push(expression);
    }

    /// Read the leaves below `group`. Null companions are not part of the
    /// selection and are skipped.
    pub fn read(doc: &XmlDocument, group: NodeId) -> Self {
        let expressions = doc
            .children(group)
            .iter()
            .filter(|c| doc.name(**c) == Some(EXPRESSION))
            .map(|c| Expression::read(doc, *c))
            .filter(|e| !e.is_null_companion())
            .collect();
        Self { expressions }
    }

    pub fn arity(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Sorted set of the leaf bRefs.
    pub fn refs(&self) -> BTreeSet<String> {
        self.expressions.iter().map(|e| e.b_ref.clone()).collect()
    }

    /// Sorted `(bRef, value)` set, the identity of a group for de-duplication
    /// and removal.
    pub fn key_set(&self) -> BTreeSet<(String, String)> {
        self.expressions
            .iter()
            .map(|e| (e.b_ref.clone(), e.value.clone().unwrap_or_default()))
            .collect()
    }

    pub fn same_selection(&self, other: &SelectionGroup) -> bool {
        self.arity() == other.arity() && self.key_set() == other.key_set()
    }

    pub fn value_of(&self, b_ref: &str) -> Option<&str> {
        self.expressions
            .iter()
            .find(|e| e.b_ref == b_ref)
            .and_then(|e| e.value.as_deref())
    }

    pub fn expression(&self, b_ref: &str) -> Option<&Expression> {
        self.expressions.iter().find(|e| e.b_ref == b_ref)
    }

    /// Inclusion form: `And` of the leaves, operators as they are.
    pub fn to_include_fragment(&self) -> XmlFragment {
        self.expressions
            .iter()
            .fold(XmlFragment::new("And"), |group, e| group.child(e.to_fragment()))
    }

    /// Exclusion form: `Or` of `!=` leaves, each followed by its null companion.
    pub fn to_exclude_fragment(&self) -> XmlFragment {
        self.expressions.iter().fold(XmlFragment::new("Or"), |group, e| {
            group
                .child(e.clone().with_op(Op::Ne).to_fragment())
                .child(Expression::null_companion(&e.b_ref).to_fragment())
        })
    }
}

/// Addresses of one dimension's containers below a filter element.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionPaths {
    pub filter: Path,
    pub dimension: String,
}

impl DimensionPaths {
    pub fn new(filter: Path, dimension: &str) -> Self {
        Self {
            filter,
            dimension: dimension.to_string(),
        }
    }

    pub fn include_container(&self) -> Path {
        self.filter.clone().child("Or").where_attr(INCLUDE_ATTR, &self.dimension)
    }

    pub fn exclude_container(&self) -> Path {
        self.filter.clone().child("And").where_attr(EXCLUDE_ATTR, &self.dimension)
    }

    pub fn include_groups(&self) -> Path {
        self.include_container().child("And")
    }

    pub fn exclude_groups(&self) -> Path {
        self.exclude_container().child("Or")
    }
}

/// Inclusion and exclusion groups of one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub included: Vec<SelectionGroup>,
    pub excluded: Vec<SelectionGroup>,
}

impl FilterState {
    pub fn read(doc: &XmlDocument, paths: &DimensionPaths) -> Self {
        let read_all = |path: &Path| {
            doc.select_nodes(path)
                .into_iter()
                .map(|g| SelectionGroup::read(doc, g))
                .collect()
        };
        Self {
            included: read_all(&paths.include_groups()),
            excluded: read_all(&paths.exclude_groups()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    pub fn first_included(&self) -> Option<&SelectionGroup> {
        self.included.first()
    }

    /// More than one inclusion group, or any exclusion.
    pub fn is_multi(&self) -> bool {
        self.included.len() > 1 || !self.excluded.is_empty()
    }
}
