//! Owned element trees, detached from any document.

use indexmap::IndexMap;

/// An owned element with its subtree.
///
/// Used to copy content between documents and to build expected trees in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlFragment {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<XmlFragment>,
}

impl XmlFragment {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: XmlFragment) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
