//! Path types for the XPath subset understood by [`XmlDocument`](crate::XmlDocument).

use crate::document::NodeId;

/// Axis along which a [`Step`] moves from its context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `name`, `child::name`
    Child,
    /// `//name`, `descendant::name`
    Descendant,
    /// `descendant-or-self::name`
    DescendantOrSelf,
    /// `@name`, `attribute::name`
    Attribute,
    /// `..`, `parent::name`
    Parent,
    /// `.`, `self::name`
    SelfNode,
    /// `ancestor::name`
    Ancestor,
    /// `ancestor-or-self::name`
    AncestorOrSelf,
}

impl Axis {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Attribute => "attribute",
            Axis::Parent => "parent",
            Axis::SelfNode => "self",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
        }
    }

    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "attribute" => Axis::Attribute,
            "parent" => Axis::Parent,
            "self" => Axis::SelfNode,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            _ => return None,
        })
    }

    /// Reverse axes yield their nodes nearest-first.
    pub fn is_reverse(self) -> bool {
        matches!(self, Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
    }
}

/// Name test of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Qualified name, compared literally (`f:Or` matches only `f:Or`).
    Name(String),
    /// `*`
    Any,
}

impl NodeTest {
    pub(crate) fn matches(&self, name: &str) -> bool {
        match self {
            NodeTest::Name(n) => n == name,
            NodeTest::Any => true,
        }
    }
}

/// Comparison operators allowed inside predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,    // =
    NotEqual, // !=
}

/// Operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Relative path evaluated against the predicate's context node.
    Path(Path),
    /// Quoted string or bare number, compared by string value.
    Literal(String),
}

/// Predicate expression: `[@a='x' and not(@b)]`, `[1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Existence test: `[Expression]`, `[@value]`
    Exists(Path),
    /// 1-based position in the step's candidate list.
    Position(usize),
}

/// One location step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

impl Step {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self { axis, test, predicates: Vec::new() }
    }
}

/// Parsed location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Absolute paths start at the document node, relative ones at the context node.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

impl Path {
    /// `/` - an absolute path with no steps yet.
    pub fn root() -> Self {
        Self { absolute: true, steps: Vec::new() }
    }

    /// `.` - a relative path with no steps yet.
    pub fn relative() -> Self {
        Self { absolute: false, steps: Vec::new() }
    }

    pub fn child(mut self, name: &str) -> Self {
        self.steps.push(Step::new(Axis::Child, name_test(name)));
        self
    }

    pub fn descendant(mut self, name: &str) -> Self {
        self.steps.push(Step::new(Axis::Descendant, name_test(name)));
        self
    }

    pub fn attr(mut self, name: &str) -> Self {
        self.steps.push(Step::new(Axis::Attribute, name_test(name)));
        self
    }

    pub fn ancestor(mut self, name: &str) -> Self {
        self.steps.push(Step::new(Axis::Ancestor, name_test(name)));
        self
    }

    /// Adds `[@name='value']` to the last step.
    pub fn where_attr(self, name: &str, value: &str) -> Self {
        self.with_predicate(Predicate::Compare {
            op: CompareOp::Equal,
            left: Operand::Path(Path::relative().attr(name)),
            right: Operand::Literal(value.to_string()),
        })
    }

    /// Adds `[@name]` to the last step.
    pub fn has_attr(self, name: &str) -> Self {
        self.with_predicate(Predicate::Exists(Path::relative().attr(name)))
    }

    /// Adds `[n]` to the last step.
    pub fn nth(self, position: usize) -> Self {
        self.with_predicate(Predicate::Position(position))
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.predicates.push(predicate);
        }
        self
    }

    /// Appends the steps of a relative path.
    pub fn join(mut self, other: &Path) -> Self {
        self.steps.extend(other.steps.iter().cloned());
        self
    }

    /// True when the path ends on the attribute axis.
    pub fn selects_attribute(&self) -> bool {
        self.steps.last().is_some_and(|s| s.axis == Axis::Attribute)
    }

    /// The path without its final step.
    pub fn parent_path(&self) -> Path {
        let mut steps = self.steps.clone();
        steps.pop();
        Path { absolute: self.absolute, steps }
    }
}

fn name_test(name: &str) -> NodeTest {
    if name == "*" {
        NodeTest::Any
    } else {
        NodeTest::Name(name.to_string())
    }
}

/// A node selected by a path: an element or one attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XmlItem {
    Element(NodeId),
    Attribute { owner: NodeId, name: String },
}

impl XmlItem {
    /// The element itself, or the element owning the attribute.
    pub fn owner(&self) -> NodeId {
        match self {
            XmlItem::Element(id) => *id,
            XmlItem::Attribute { owner, .. } => *owner,
        }
    }

    pub fn as_element(&self) -> Option<NodeId> {
        match self {
            XmlItem::Element(id) => Some(*id),
            XmlItem::Attribute { .. } => None,
        }
    }
}
