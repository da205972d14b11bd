//! Path utility helpers.

use std::fmt;

use crate::types::{Axis, CompareOp, NodeTest, Operand, Path, Predicate, Step};

/// Convert a path AST to its textual form. The output parses back to an equal AST.
pub fn path_to_string(path: &Path) -> String {
    let mut out = String::new();

    if path.steps.is_empty() {
        out.push(if path.absolute { '/' } else { '.' });
        return out;
    }

    for (i, step) in path.steps.iter().enumerate() {
        let descendant_shorthand = step.axis == Axis::Descendant && (i > 0 || path.absolute);
        if descendant_shorthand {
            out.push_str("//");
        } else if i > 0 || path.absolute {
            out.push('/');
        }
        out.push_str(&step_to_string(step, descendant_shorthand));
    }

    out
}

/// Attribute names tested or selected anywhere in the path, predicates included.
pub fn referenced_attributes(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    collect_attributes(path, &mut names);
    names
}

fn collect_attributes(path: &Path, names: &mut Vec<String>) {
    for step in &path.steps {
        if let (Axis::Attribute, NodeTest::Name(n)) = (step.axis, &step.test) {
            if !names.contains(n) {
                names.push(n.clone());
            }
        }
        for predicate in &step.predicates {
            collect_predicate_attributes(predicate, names);
        }
    }
}

fn collect_predicate_attributes(predicate: &Predicate, names: &mut Vec<String>) {
    match predicate {
        Predicate::Compare { left, right, .. } => {
            for operand in [left, right] {
                if let Operand::Path(p) = operand {
                    collect_attributes(p, names);
                }
            }
        }
        Predicate::And(l, r) | Predicate::Or(l, r) => {
            collect_predicate_attributes(l, names);
            collect_predicate_attributes(r, names);
        }
        Predicate::Not(inner) => collect_predicate_attributes(inner, names),
        Predicate::Exists(p) => collect_attributes(p, names),
        Predicate::Position(_) => {}
    }
}

fn step_to_string(step: &Step, descendant_shorthand: bool) -> String {
    let test = match &step.test {
        NodeTest::Name(n) => n.as_str(),
        NodeTest::Any => "*",
    };

    let mut out = match step.axis {
        Axis::Child => test.to_string(),
        Axis::Descendant if descendant_shorthand => test.to_string(),
        Axis::Attribute => format!("@{}", test),
        Axis::Parent if step.test == NodeTest::Any => "..".to_string(),
        Axis::SelfNode if step.test == NodeTest::Any => ".".to_string(),
        axis => format!("{}::{}", axis.keyword(), test),
    };

    for predicate in &step.predicates {
        out.push('[');
        out.push_str(&predicate_to_string(predicate, false));
        out.push(']');
    }

    out
}

fn predicate_to_string(predicate: &Predicate, inside_and: bool) -> String {
    match predicate {
        Predicate::Compare { op, left, right } => {
            let op = match op {
                CompareOp::Equal => "=",
                CompareOp::NotEqual => "!=",
            };
            format!("{}{}{}", operand_to_string(left), op, operand_to_string(right))
        }
        Predicate::And(l, r) => format!(
            "{} and {}",
            predicate_to_string(l, true),
            predicate_to_string(r, true)
        ),
        Predicate::Or(l, r) => {
            let s = format!(
                "{} or {}",
                predicate_to_string(l, false),
                predicate_to_string(r, false)
            );
            if inside_and {
                format!("({})", s)
            } else {
                s
            }
        }
        Predicate::Not(inner) => format!("not({})", predicate_to_string(inner, false)),
        Predicate::Exists(path) => path_to_string(path),
        Predicate::Position(n) => n.to_string(),
    }
}

fn operand_to_string(operand: &Operand) -> String {
    match operand {
        Operand::Path(p) => path_to_string(p),
        Operand::Literal(s) => quote_literal(s),
    }
}

fn quote_literal(value: &str) -> String {
    if value.contains('\'') && !value.contains('"') && !value.contains('\\') {
        return format!("\"{}\"", value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&path_to_string(self))
    }
}
