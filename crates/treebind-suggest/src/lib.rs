//! Multi-level suggestions over XML option models.
//!
//! Options are read from a model into [`Candidate`]s, each with one text per
//! value level. A typed [`Query`] is split into per-level sub-queries of
//! lowercase tokens and matched by a [`SuggestMatcher`], which keeps the
//! sub-queries in level order and reports the matched byte ranges for
//! highlighting. [`SuggestInput`] wires this to a [`Workspace`]: it follows
//! the options model, debounces keystrokes and writes the chosen value back.
//!
//! # Example
//!
//! ```
//! use treebind_suggest::{Candidate, Query, SuggestMatcher, WildcardMode};
//!
//! let candidates = vec![Candidate::new("Berlin", "BER"), Candidate::new("Neuberlin", "NBL")];
//! let matcher = SuggestMatcher::new(WildcardMode::Contains);
//! let found = matcher.match_all(&Query::parse("ber", None), &candidates);
//! assert_eq!(found.len(), 2);
//! assert_eq!(found[1].highlighted("<b>", "</b>"), "Neu<b>ber</b>lin");
//! ```
//!
//! [`Workspace`]: treebind_core::Workspace

mod error;
pub use error::SuggestError;

mod candidate;
pub use candidate::{Candidate, CandidateSource};

mod query;
pub use query::Query;

mod matcher;
pub use matcher::{MatchSpan, SuggestMatcher, Suggestion, WildcardMode};

mod config;
pub use config::SuggestConfig;

mod widget;
pub use widget::SuggestInput;

#[cfg(test)]
mod tests {
    use super::*;
    use treebind_xml::{PathParser, XmlDocument};

    fn span(level: usize, start: usize, end: usize) -> MatchSpan {
        MatchSpan { level, start, end }
    }

    #[test]
    fn test_startswith_berlin() {
        let matcher = SuggestMatcher::new(WildcardMode::StartsWith);
        let found = matcher.match_all(&Query::parse("ber", None), &[Candidate::new("Berlin", "BER")]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].spans, vec![span(0, 0, 3)]);
        assert_eq!(found[0].highlighted("<b>", "</b>"), "<b>Ber</b>lin");
    }

    #[test]
    fn test_contains_across_levels() {
        let candidate = Candidate::with_levels("Neu Berlin", "x", &["Neu", "Berlin"]);
        let contains = SuggestMatcher::new(WildcardMode::Contains);
        let found = contains.match_all(&Query::parse("ber", None), std::slice::from_ref(&candidate));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].spans, vec![span(1, 0, 3)]);

        let glued = Candidate::new("Neuberlin", "x");
        assert_eq!(contains.match_all(&Query::parse("ber", None), std::slice::from_ref(&glued)).len(), 1);
        let prefix = SuggestMatcher::new(WildcardMode::StartsWith);
        assert!(prefix.match_all(&Query::parse("ber", None), &[glued]).is_empty());
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let candidates = vec![Candidate::new("b", "1"), Candidate::new("a", "2")];
        let found = SuggestMatcher::default().match_all(&Query::parse("  ", None), &candidates);
        let back: Vec<_> = found.iter().map(|s| s.candidate.clone()).collect();
        assert_eq!(back, candidates);
        assert!(found.iter().all(|s| s.spans.is_empty()));
    }

    #[test]
    fn test_sort_and_limit() {
        let candidates = vec![
            Candidate::new("bonn", "1"),
            Candidate::new("Berlin", "2"),
            Candidate::new("Bremen", "3"),
        ];
        let matcher = SuggestMatcher::default().sorted().limit(2);
        let found = matcher.match_all(&Query::parse("b", None), &candidates);
        let captions: Vec<_> = found.iter().map(|s| s.candidate.caption.as_str()).collect();
        assert_eq!(captions, vec!["Berlin", "bonn"]);
    }

    #[test]
    fn test_extract_candidates() {
        let doc = XmlDocument::parse(
            r#"<Values><Value id="BER"><C>Germany</C><C>Berlin</C></Value><Value id="PAR"><C>France</C><C>Paris</C></Value></Values>"#,
        )
        .unwrap();
        let source = CandidateSource::new(PathParser::parse("/Values/Value").unwrap())
            .value(PathParser::parse("@id").unwrap())
            .cells(PathParser::parse("C").unwrap());
        let candidates = source.extract(&doc);
        assert_eq!(
            candidates,
            vec![
                Candidate::with_levels("Germany Berlin", "BER", &["Germany", "Berlin"]),
                Candidate::with_levels("France Paris", "PAR", &["France", "Paris"]),
            ]
        );
    }

    #[test]
    fn test_extract_attribute_options() {
        let doc = XmlDocument::parse(r#"<Values><V name="Bonn"/><V name="Bremen"/></Values>"#).unwrap();
        let source = CandidateSource::new(PathParser::parse("/Values/V/@name").unwrap());
        assert_eq!(
            source.extract(&doc),
            vec![Candidate::new("Bonn", "Bonn"), Candidate::new("Bremen", "Bremen")]
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = SuggestConfig::from_json(
            r#"{"id":"s","optionsModel":"o","optionsPath":"/V","targetModel":"t","targetPath":"/T/@v"}"#,
        )
        .unwrap();
        assert_eq!(config, SuggestConfig::new("s", "o", "/V", "t", "/T/@v"));
        assert_eq!(config.wildcard, WildcardMode::StartsWith);
        assert_eq!(config.debounce_ms, 200);

        let config = SuggestConfig::from_json(
            r#"{"id":"s","optionsModel":"o","optionsPath":"/V","targetModel":"t","targetPath":"/T","wildcard":"contains","levelSeparator":"/","maxResults":5}"#,
        )
        .unwrap();
        assert_eq!(config.matcher(), SuggestMatcher::new(WildcardMode::Contains).limit(5));
        assert_eq!(config.level_separator.as_deref(), Some("/"));
    }

    #[test]
    fn test_config_errors() {
        assert!(matches!(SuggestConfig::from_json("{}"), Err(SuggestError::Config(_))));
        let config = SuggestConfig::new("s", "o", "/V[", "t", "/T");
        assert!(matches!(config.source(), Err(SuggestError::InvalidPath { .. })));
    }
}
