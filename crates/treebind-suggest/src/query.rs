/// A free-text query split into per-level token lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    /// Lowercased whitespace tokens of each sub-query, empty sub-queries dropped.
    pub levels: Vec<Vec<String>>,
}

impl Query {
    /// Split `text` on `separator` (when given) into sub-queries and each
    /// sub-query into lowercase tokens.
    pub fn parse(text: &str, separator: Option<&str>) -> Self {
        let parts: Vec<&str> = match separator {
            Some(sep) if !sep.is_empty() => text.split(sep).collect(),
            _ => vec![text],
        };
        let levels = parts
            .into_iter()
            .map(|part| part.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self {
            text: text.to_string(),
            levels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}
