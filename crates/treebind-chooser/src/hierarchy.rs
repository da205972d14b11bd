//! Dimension hierarchies and required-level chains.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use treebind_xml::{PathParser, XmlDocument};

use crate::error::ChooserError;

/// One rung of a dimension hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: String,
    /// Column reference used as the filter leaf key.
    pub b_ref: String,
    /// A unique level identifies a value on its own and ends the chain.
    #[serde(default)]
    pub unique: bool,
    #[serde(default, rename = "requires", skip_serializing_if = "Option::is_none")]
    pub preceding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Level {
    pub fn new(id: &str, b_ref: &str) -> Self {
        Self {
            id: id.to_string(),
            b_ref: b_ref.to_string(),
            unique: false,
            preceding: None,
            caption: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn requires(mut self, level_id: &str) -> Self {
        self.preceding = Some(level_id.to_string());
        self
    }

    pub fn caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn display_caption(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.id)
    }
}

/// Levels of one dimension in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub levels: Vec<Level>,
}

impl Hierarchy {
    /// Build and validate a hierarchy.
    pub fn new(levels: Vec<Level>) -> Result<Self, ChooserError> {
        let hierarchy = Self {
            dimension: None,
            levels,
        };
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    pub fn from_json(json: &str) -> Result<Self, ChooserError> {
        let hierarchy: Self = serde_json::from_str(json)?;
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Read `Hierarchy/Level` elements. An omitted `requires` on a level that
    /// is not the first one defaults to the previously declared level.
    pub fn from_xml(doc: &XmlDocument) -> Result<Self, ChooserError> {
        let level_path = PathParser::parse("/*/Level").map_err(|source| ChooserError::InvalidPath {
            path: "/*/Level".to_string(),
            source,
        })?;
        let root = doc.root();

        let mut levels: Vec<Level> = Vec::new();
        for node in doc.select_nodes(&level_path) {
            let attr = |name: &str| doc.attribute(node, name).map(str::to_string);
            let id = attr("id").ok_or(ChooserError::MissingLevelId)?;
            let b_ref = attr("bRef").unwrap_or_else(|| id.clone());
            let unique = doc.attribute(node, "unique") == Some("true");
            let preceding = match attr("requires") {
                Some(requires) if requires.is_empty() => None,
                Some(requires) => Some(requires),
                None => levels.last().map(|l| l.id.clone()),
            };
            levels.push(Level {
                id,
                b_ref,
                unique,
                preceding,
                caption: attr("caption"),
            });
        }

        let hierarchy = Self {
            dimension: doc.attribute(root, "dimension").map(str::to_string),
            levels,
        };
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    pub fn from_xml_str(xml: &str) -> Result<Self, ChooserError> {
        Self::from_xml(&XmlDocument::parse(xml)?)
    }

    /// Check for an empty hierarchy, duplicate ids and broken or cyclic chains.
    pub fn validate(&self) -> Result<(), ChooserError> {
        if self.levels.is_empty() {
            return Err(ChooserError::EmptyHierarchy);
        }
        for (i, level) in self.levels.iter().enumerate() {
            if self.levels[..i].iter().any(|l| l.id == level.id) {
                return Err(ChooserError::DuplicateLevel(level.id.clone()));
            }
        }
        for level in &self.levels {
            self.required_chain(&level.id)?;
        }
        Ok(())
    }

    pub fn level(&self, id: &str) -> Result<&Level, ChooserError> {
        self.levels
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| ChooserError::UnknownLevel(id.to_string()))
    }

    pub fn level_by_ref(&self, b_ref: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.b_ref == b_ref)
    }

    /// Levels needed to identify `level_id`, root first.
    ///
    /// Walks `requires` while the current level is not unique. Fails with
    /// `MissingPredecessor` on a dangling reference and `CyclicHierarchy`
    /// when the walk revisits a level.
    pub fn required_chain(&self, level_id: &str) -> Result<Vec<&Level>, ChooserError> {
        let mut current = self.level(level_id)?;
        let mut chain = vec![current];

        while !current.unique {
            let Some(preceding) = &current.preceding else {
                break;
            };
            current = self
                .levels
                .iter()
                .find(|l| &l.id == preceding)
                .ok_or_else(|| ChooserError::MissingPredecessor {
                    level: current.id.clone(),
                    predecessor: preceding.clone(),
                })?;
            if chain.iter().any(|l| l.id == current.id) {
                return Err(ChooserError::CyclicHierarchy(level_id.to_string()));
            }
            chain.push(current);
        }

        chain.reverse();
        Ok(chain)
    }

    pub fn required_chain_ids(&self, level_id: &str) -> Result<Vec<String>, ChooserError> {
        Ok(self
            .required_chain(level_id)?
            .into_iter()
            .map(|l| l.id.clone())
            .collect())
    }

    /// Sorted bRef set of the required chain.
    pub fn required_refs(&self, level_id: &str) -> Result<BTreeSet<String>, ChooserError> {
        Ok(self
            .required_chain(level_id)?
            .into_iter()
            .map(|l| l.b_ref.clone())
            .collect())
    }

    /// Every bRef the hierarchy knows.
    pub fn b_refs(&self) -> BTreeSet<&str> {
        self.levels.iter().map(|l| l.b_ref.as_str()).collect()
    }
}
