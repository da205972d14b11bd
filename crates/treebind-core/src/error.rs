use thiserror::Error;
use treebind_xml::XmlError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("model already registered: {0}")]
    DuplicateModel(String),
    #[error("document error: {0}")]
    Xml(#[from] XmlError),
}

/// Error type returned by listener callbacks and timer tasks.
pub type CallbackError = Box<dyn std::error::Error>;
