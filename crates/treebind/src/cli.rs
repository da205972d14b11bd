//! Shared logic of the command-line tools.

use thiserror::Error;
use treebind_suggest::{CandidateSource, Query, SuggestMatcher, WildcardMode};
use treebind_xml::{ParseError, PathParser, XmlDocument, XmlError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Xml(#[from] XmlError),
}

fn parse_path(path: &str) -> Result<treebind_xml::Path, CliError> {
    PathParser::parse(path).map_err(|source| CliError::Path {
        path: path.to_string(),
        source,
    })
}

/// Values of everything `path` selects in `xml`, in document order.
pub fn select_values(xml: &str, path: &str) -> Result<Vec<String>, CliError> {
    let doc = XmlDocument::parse(xml)?;
    let path = parse_path(path)?;
    Ok(doc.select(&path).iter().filter_map(|item| doc.item_value(item)).collect())
}

/// Options of `xml` selected by `options_path` that match `query`, rendered
/// as `value<TAB>highlighted caption` with matches in `[` `]`.
pub fn suggest(
    xml: &str,
    options_path: &str,
    cell_path: Option<&str>,
    query: &str,
    mode: WildcardMode,
) -> Result<Vec<String>, CliError> {
    let doc = XmlDocument::parse(xml)?;
    let mut source = CandidateSource::new(parse_path(options_path)?);
    if let Some(cells) = cell_path {
        source = source.cells(parse_path(cells)?);
    }
    let candidates = source.extract(&doc);
    let found = SuggestMatcher::new(mode).match_all(&Query::parse(query, None), &candidates);
    Ok(found
        .iter()
        .map(|s| format!("{}\t{}", s.candidate.value, s.highlighted("[", "]")))
        .collect())
}
