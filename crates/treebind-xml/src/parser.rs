//! Path parser for the XPath subset.

use crate::types::*;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty path")]
    Empty,
    #[error("Unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Unknown axis: {0}")]
    UnknownAxis(String),
    #[error("Invalid escape sequence")]
    InvalidEscape,
    #[error("Unclosed string")]
    UnclosedString,
    #[error("Invalid predicate")]
    InvalidPredicate,
    #[error("Positions start at 1")]
    ZeroPosition,
}

/// Operand as read from the input, before the predicate shape is known.
enum RawOperand {
    Path(Path),
    Str(String),
    Number(String),
}

/// Path parser.
pub struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    /// Parse a path expression.
    pub fn parse(input: &'a str) -> Result<Path, ParseError> {
        let mut parser = Self { input, pos: 0 };
        parser.skip_whitespace();
        if parser.is_at_end() {
            return Err(ParseError::Empty);
        }
        let path = parser.parse_path()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(path),
            Some(c) => Err(ParseError::UnexpectedChar(c, parser.pos)),
        }
    }

    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let mut path = Path::relative();
        let mut axis = Axis::Child;

        if self.peek_str("//") {
            self.advance_by(2);
            path.absolute = true;
            axis = Axis::Descendant;
        } else if self.peek() == Some('/') {
            self.advance();
            path.absolute = true;
            // A lone `/` selects the document node.
            if !self.at_step_start() {
                return Ok(path);
            }
        }

        self.parse_steps(&mut path, axis)?;
        Ok(path)
    }

    fn parse_steps(&mut self, path: &mut Path, mut axis: Axis) -> Result<(), ParseError> {
        loop {
            let step = self.parse_step(axis)?;
            path.steps.push(step);

            if self.peek_str("//") {
                self.advance_by(2);
                axis = Axis::Descendant;
            } else if self.peek() == Some('/') {
                self.advance();
                axis = Axis::Child;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_step(&mut self, default_axis: Axis) -> Result<Step, ParseError> {
        let descendant = default_axis == Axis::Descendant;
        let start = self.pos;

        let mut step = if self.peek_str("..") {
            self.advance_by(2);
            Step::new(Axis::Parent, NodeTest::Any)
        } else if self.peek() == Some('.') {
            self.advance();
            Step::new(Axis::SelfNode, NodeTest::Any)
        } else if self.peek() == Some('@') {
            self.advance();
            Step::new(Axis::Attribute, self.parse_node_test()?)
        } else if self.peek() == Some('*') {
            self.advance();
            Step::new(default_axis, NodeTest::Any)
        } else {
            let name = self.parse_qname()?;
            if self.peek_str("::") {
                let axis = Axis::from_keyword(&name).ok_or(ParseError::UnknownAxis(name))?;
                self.advance_by(2);
                if descendant {
                    return Err(ParseError::UnexpectedChar(':', self.pos - 2));
                }
                Step::new(axis, self.parse_node_test()?)
            } else {
                Step::new(default_axis, NodeTest::Name(name))
            }
        };

        // `//` only combines with a plain name test.
        if descendant && step.axis != Axis::Descendant {
            let c = self.input[start..].chars().next().unwrap_or('/');
            return Err(ParseError::UnexpectedChar(c, start));
        }

        while self.peek() == Some('[') {
            self.advance();
            self.skip_whitespace();
            let predicate = self.parse_or()?;
            self.skip_whitespace();
            self.expect(']')?;
            step.predicates.push(predicate);
        }

        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, ParseError> {
        if self.peek() == Some('*') {
            self.advance();
            return Ok(NodeTest::Any);
        }
        Ok(NodeTest::Name(self.parse_qname()?))
    }

    fn parse_qname(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.advance(),
            Some(c) => return Err(ParseError::UnexpectedChar(c, self.pos)),
            None => return Err(ParseError::UnexpectedEnd),
        }

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                self.advance();
            } else if c == ':' && !self.peek_str("::") {
                self.advance();
            } else {
                break;
            }
        }

        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_or(&mut self) -> Result<Predicate, ParseError> {
        let mut left = self.parse_and()?;
        self.skip_whitespace();

        while self.peek_keyword("or") {
            self.advance_by(2);
            self.skip_whitespace();
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
            self.skip_whitespace();
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, ParseError> {
        let mut left = self.parse_unary()?;
        self.skip_whitespace();

        while self.peek_keyword("and") {
            self.advance_by(3);
            self.skip_whitespace();
            let right = self.parse_unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
            self.skip_whitespace();
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();

        if self.peek_str("not") && self.next_non_space_after(3) == Some('(') {
            self.advance_by(3);
            self.skip_whitespace();
            self.expect('(')?;
            let inner = self.parse_or()?;
            self.skip_whitespace();
            self.expect(')')?;
            return Ok(Predicate::Not(Box::new(inner)));
        }

        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_or()?;
            self.skip_whitespace();
            self.expect(')')?;
            return Ok(inner);
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Predicate, ParseError> {
        let left = self.parse_operand()?;
        self.skip_whitespace();

        let op = if self.peek_str("!=") {
            self.advance_by(2);
            Some(CompareOp::NotEqual)
        } else if self.peek() == Some('=') {
            self.advance();
            Some(CompareOp::Equal)
        } else {
            None
        };

        match (op, left) {
            (Some(op), left) => {
                let right = self.parse_operand()?;
                Ok(Predicate::Compare {
                    op,
                    left: Self::operand(left),
                    right: Self::operand(right),
                })
            }
            (None, RawOperand::Path(path)) => Ok(Predicate::Exists(path)),
            (None, RawOperand::Number(n)) => match n.parse::<usize>() {
                Ok(0) => Err(ParseError::ZeroPosition),
                Ok(position) => Ok(Predicate::Position(position)),
                Err(_) => Err(ParseError::InvalidPredicate),
            },
            (None, RawOperand::Str(_)) => Err(ParseError::InvalidPredicate),
        }
    }

    fn operand(raw: RawOperand) -> Operand {
        match raw {
            RawOperand::Path(path) => Operand::Path(path),
            RawOperand::Str(s) | RawOperand::Number(s) => Operand::Literal(s),
        }
    }

    fn parse_operand(&mut self) -> Result<RawOperand, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') | Some('"') => Ok(RawOperand::Str(self.parse_string()?)),
            Some(c) if c.is_ascii_digit() => Ok(RawOperand::Number(self.parse_number())),
            Some('/') => Ok(RawOperand::Path(self.parse_path()?)),
            Some(_) if self.at_step_start() => {
                let mut path = Path::relative();
                self.parse_steps(&mut path, Axis::Child)?;
                Ok(RawOperand::Path(path))
            }
            Some(c) => Err(ParseError::UnexpectedChar(c, self.pos)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_number(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some('0'..='9') | Some('.')) {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q) => q,
            None => return Err(ParseError::UnexpectedEnd),
        };
        self.advance();

        let mut result = String::new();

        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedString),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('\\') => result.push('\\'),
                        Some('\'') => result.push('\''),
                        Some('"') => result.push('"'),
                        _ => return Err(ParseError::InvalidEscape),
                    }
                    self.advance();
                }
                Some(c) => {
                    result.push(c);
                    self.advance();
                }
            }
        }

        Ok(result)
    }

    fn at_step_start(&self) -> bool {
        matches!(self.peek(), Some(c) if c == '.' || c == '@' || c == '*' || c == '_' || c.is_alphabetic())
    }

    /// Keyword followed by something that cannot continue a name.
    fn peek_keyword(&self, keyword: &str) -> bool {
        if !self.peek_str(keyword) {
            return false;
        }
        match self.input[self.pos + keyword.len()..].chars().next() {
            None => true,
            Some(c) => !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':'),
        }
    }

    fn next_non_space_after(&self, offset: usize) -> Option<char> {
        self.input[self.pos + offset..].chars().find(|c| !c.is_whitespace())
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(ParseError::UnexpectedChar(c, self.pos)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }
}
