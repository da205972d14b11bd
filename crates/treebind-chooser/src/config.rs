use serde::{Deserialize, Serialize};
use treebind_xml::{Path, PathParser};

use crate::error::ChooserError;
use crate::filter::DimensionPaths;

/// Widget configuration, camelCase on the wire.
///
/// ```json
/// { "id": "geo", "dimension": "geo", "targetModel": "guiStatus", "targetPath": "/Status/Filter" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooserConfig {
    /// Widget id, also the anchor id and the owner of its change origins.
    pub id: String,
    pub dimension: String,
    pub target_model: String,
    /// Filter element holding the dimension containers.
    pub target_path: String,
    /// Staging model id, `{id}_status` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_model: Option<String>,
}

impl ChooserConfig {
    pub fn new(id: &str, dimension: &str, target_model: &str, target_path: &str) -> Self {
        Self {
            id: id.to_string(),
            dimension: dimension.to_string(),
            target_model: target_model.to_string(),
            target_path: target_path.to_string(),
            status_model: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ChooserError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn staging_model_id(&self) -> String {
        self.status_model
            .clone()
            .unwrap_or_else(|| format!("{}_status", self.id))
    }

    pub fn filter_path(&self) -> Result<Path, ChooserError> {
        PathParser::parse(&self.target_path).map_err(|source| ChooserError::InvalidPath {
            path: self.target_path.clone(),
            source,
        })
    }

    pub fn paths(&self) -> Result<DimensionPaths, ChooserError> {
        Ok(DimensionPaths::new(self.filter_path()?, &self.dimension))
    }

    /// Anchor id of the input control of one level.
    pub fn input_anchor(&self, level_id: &str) -> String {
        format!("{}_{}", self.id, level_id)
    }
}
