use thiserror::Error;
use treebind_core::TrackingError;
use treebind_xml::{ParseError, XmlError};

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("invalid path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("no suggestion at index {0}")]
    NoSuchSuggestion(usize),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),
}
