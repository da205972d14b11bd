use thiserror::Error;

use crate::parser::ParseError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("UNKNOWN_NODE")]
    UnknownNode,

    #[error("the root element cannot be removed")]
    RootRemoval,

    #[error("invalid path: {0}")]
    Path(#[from] ParseError),

    #[error("cannot create nodes for path: {0}")]
    NotPrototypable(String),

    #[error("path starts at '{expected}' but the document root is '{found}'")]
    RootMismatch { expected: String, found: String },
}
