//! Candidates extracted from an options model.

use treebind_xml::{NodeId, Path, XmlDocument};

/// One selectable option. `levels` holds the text of each value level; a
/// single-level option has its caption as the only level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub caption: String,
    pub value: String,
    pub levels: Vec<String>,
}

impl Candidate {
    pub fn new(caption: &str, value: &str) -> Self {
        Self {
            caption: caption.to_string(),
            value: value.to_string(),
            levels: vec![caption.to_string()],
        }
    }

    pub fn with_levels(caption: &str, value: &str, levels: &[&str]) -> Self {
        Self {
            caption: caption.to_string(),
            value: value.to_string(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Where the options live in their model.
///
/// `options` selects one node per candidate. The other paths are relative to
/// that node: `caption` defaults to the node's string value, `value`
/// defaults to the caption, and `cells`, when set, selects one node per
/// value level.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSource {
    pub options: Path,
    pub caption: Option<Path>,
    pub value: Option<Path>,
    pub cells: Option<Path>,
}

impl CandidateSource {
    pub fn new(options: Path) -> Self {
        Self {
            options,
            caption: None,
            value: None,
            cells: None,
        }
    }

    pub fn caption(mut self, path: Path) -> Self {
        self.caption = Some(path);
        self
    }

    pub fn value(mut self, path: Path) -> Self {
        self.value = Some(path);
        self
    }

    pub fn cells(mut self, path: Path) -> Self {
        self.cells = Some(path);
        self
    }

    /// Candidates in document order.
    pub fn extract(&self, doc: &XmlDocument) -> Vec<Candidate> {
        doc.select(&self.options)
            .iter()
            .filter_map(|item| match item.as_element() {
                Some(node) => Some(self.candidate(doc, node)),
                // Attribute options: the attribute value is caption and value.
                None => doc.item_value(item).map(|v| Candidate::new(&v, &v)),
            })
            .collect()
    }

    fn candidate(&self, doc: &XmlDocument, node: NodeId) -> Candidate {
        let levels: Vec<String> = match &self.cells {
            Some(cells) => doc
                .select_from(node, cells)
                .iter()
                .filter_map(|i| doc.item_value(i))
                .collect(),
            None => Vec::new(),
        };

        let caption = match &self.caption {
            Some(path) => doc.value_of_from(node, path).unwrap_or_default(),
            None if !levels.is_empty() => levels.join(" "),
            None => doc.string_value(node),
        };
        let value = match &self.value {
            Some(path) => doc.value_of_from(node, path).unwrap_or_else(|| caption.clone()),
            None => caption.clone(),
        };
        let levels = if levels.is_empty() { vec![caption.clone()] } else { levels };

        Candidate { caption, value, levels }
    }
}
