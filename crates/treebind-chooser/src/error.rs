use thiserror::Error;
use treebind_core::TrackingError;
use treebind_xml::{ParseError, XmlError};

#[derive(Debug, Error)]
pub enum ChooserError {
    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("level '{level}' requires '{predecessor}', which is not defined")]
    MissingPredecessor { level: String, predecessor: String },

    #[error("cyclic requires chain at level '{0}'")]
    CyclicHierarchy(String),

    #[error("hierarchy has no levels")]
    EmptyHierarchy,

    #[error("level definition without id")]
    MissingLevelId,

    #[error("level defined twice: {0}")]
    DuplicateLevel(String),

    #[error("no value for level '{0}'")]
    IncompleteSelection(String),

    #[error("invalid path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),
}
