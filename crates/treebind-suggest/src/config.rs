use serde::{Deserialize, Serialize};
use treebind_xml::{Path, PathParser};

use crate::candidate::CandidateSource;
use crate::error::SuggestError;
use crate::matcher::{SuggestMatcher, WildcardMode};

fn default_debounce_ms() -> u64 {
    200
}

/// Widget configuration, camelCase on the wire.
///
/// ```json
/// {
///   "id": "station",
///   "optionsModel": "stations",
///   "optionsPath": "/Values/Value",
///   "valuePath": "@id",
///   "targetModel": "guiStatus",
///   "targetPath": "/Status/Station/@value",
///   "wildcard": "contains"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestConfig {
    /// Widget id, also the anchor id and the owner of its change origins.
    pub id: String,
    pub options_model: String,
    /// One node per option.
    pub options_path: String,
    /// Relative to an option node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_path: Option<String>,
    /// Relative to an option node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_path: Option<String>,
    /// Relative to an option node, one node per value level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_path: Option<String>,
    pub target_model: String,
    /// Receives the value of the chosen option.
    pub target_path: String,
    /// Receives the caption of the chosen option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_caption_path: Option<String>,
    #[serde(default)]
    pub wildcard: WildcardMode,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub sort: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    /// Splits the typed text into per-level sub-queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_separator: Option<String>,
}

impl SuggestConfig {
    pub fn new(id: &str, options_model: &str, options_path: &str, target_model: &str, target_path: &str) -> Self {
        Self {
            id: id.to_string(),
            options_model: options_model.to_string(),
            options_path: options_path.to_string(),
            caption_path: None,
            value_path: None,
            cell_path: None,
            target_model: target_model.to_string(),
            target_path: target_path.to_string(),
            target_caption_path: None,
            wildcard: WildcardMode::default(),
            debounce_ms: default_debounce_ms(),
            sort: false,
            max_results: None,
            level_separator: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SuggestError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn source(&self) -> Result<CandidateSource, SuggestError> {
        let mut source = CandidateSource::new(parse(&self.options_path)?);
        if let Some(path) = &self.caption_path {
            source = source.caption(parse(path)?);
        }
        if let Some(path) = &self.value_path {
            source = source.value(parse(path)?);
        }
        if let Some(path) = &self.cell_path {
            source = source.cells(parse(path)?);
        }
        Ok(source)
    }

    pub fn target(&self) -> Result<Path, SuggestError> {
        parse(&self.target_path)
    }

    pub fn target_caption(&self) -> Result<Option<Path>, SuggestError> {
        self.target_caption_path.as_deref().map(parse).transpose()
    }

    pub fn matcher(&self) -> SuggestMatcher {
        SuggestMatcher {
            mode: self.wildcard,
            sort: self.sort,
            max_results: self.max_results,
        }
    }
}

fn parse(path: &str) -> Result<Path, SuggestError> {
    PathParser::parse(path).map_err(|source| SuggestError::InvalidPath {
        path: path.to_string(),
        source,
    })
}
