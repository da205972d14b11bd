//! Shared documents keyed by id.

use indexmap::IndexMap;
use treebind_xml::XmlDocument;

use crate::error::TrackingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Initialized,
    Loading,
    /// Terminal state that releases waiting continuations.
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: String,
    pub document: XmlDocument,
    pub state: ReadyState,
}

impl Model {
    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }
}

#[derive(Debug, Default, Clone)]
pub struct ModelStore {
    models: IndexMap<String, Model>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, document: XmlDocument, state: ReadyState) -> Result<(), TrackingError> {
        if self.models.contains_key(id) {
            return Err(TrackingError::DuplicateModel(id.to_string()));
        }
        self.models.insert(
            id.to_string(),
            Model {
                id: id.to_string(),
                document,
                state,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Model, TrackingError> {
        self.models
            .shift_remove(id)
            .ok_or_else(|| TrackingError::UnknownModel(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Result<&Model, TrackingError> {
        self.models
            .get(id)
            .ok_or_else(|| TrackingError::UnknownModel(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Model, TrackingError> {
        self.models
            .get_mut(id)
            .ok_or_else(|| TrackingError::UnknownModel(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.models.get(id).is_some_and(Model::is_ready)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.models.keys().map(String::as_str)
    }
}
