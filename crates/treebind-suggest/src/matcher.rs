//! Multi-level token matching.

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::query::Query;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WildcardMode {
    /// A token matches the beginning of a word.
    #[default]
    StartsWith,
    /// A token matches anywhere inside a word.
    Contains,
}

/// Highlighted byte range `start..end` of `levels[level]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchSpan {
    pub level: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub candidate: Candidate,
    /// Sorted by level, then position.
    pub spans: Vec<MatchSpan>,
}

impl Suggestion {
    /// Each level with its spans wrapped in `open`/`close`.
    pub fn highlighted_levels(&self, open: &str, close: &str) -> Vec<String> {
        self.candidate
            .levels
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let spans: Vec<&MatchSpan> = self.spans.iter().filter(|s| s.level == i).collect();
                highlight(text, &spans, open, close)
            })
            .collect()
    }

    /// All levels highlighted and joined by a space.
    pub fn highlighted(&self, open: &str, close: &str) -> String {
        self.highlighted_levels(open, close).join(" ")
    }
}

fn highlight(text: &str, spans: &[&MatchSpan], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    let mut pos = 0;
    for span in spans {
        if span.start < pos {
            continue;
        }
        // Spans that do not fall on char boundaries are not highlighted.
        let (Some(before), Some(marked)) = (text.get(pos..span.start), text.get(span.start..span.end)) else {
            continue;
        };
        out.push_str(before);
        out.push_str(open);
        out.push_str(marked);
        out.push_str(close);
        pos = span.end;
    }
    out.push_str(text.get(pos..).unwrap_or_default());
    out
}

/// A word of one value level with its byte offset.
struct Word {
    start: usize,
    text: String,
    lower: String,
    consumed: bool,
}

fn words(text: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                out.push(word(text, s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(word(text, s, text.len()));
    }
    out
}

fn word(text: &str, start: usize, end: usize) -> Word {
    let raw = &text[start..end];
    Word {
        start,
        text: raw.to_string(),
        lower: raw.to_lowercase(),
        consumed: false,
    }
}

/// Ranks and marks candidates against a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestMatcher {
    pub mode: WildcardMode,
    /// Sort accepted candidates case-insensitively by caption.
    pub sort: bool,
    pub max_results: Option<usize>,
}

impl SuggestMatcher {
    pub fn new(mode: WildcardMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn sorted(mut self) -> Self {
        self.sort = true;
        self
    }

    pub fn limit(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Accepted candidates with their highlight spans.
    ///
    /// An empty query accepts every candidate without spans. Otherwise a
    /// candidate is accepted when every token of every sub-query is consumed
    /// by a distinct word. Sub-query `sl` of `S` may only match value levels
    /// `sl ..= V - S + sl` of a candidate with `V` levels, so the sub-queries
    /// keep their order across the levels.
    pub fn match_all(&self, query: &Query, candidates: &[Candidate]) -> Vec<Suggestion> {
        let mut out: Vec<Suggestion> = if query.is_empty() {
            candidates
                .iter()
                .map(|c| Suggestion {
                    candidate: c.clone(),
                    spans: Vec::new(),
                })
                .collect()
        } else {
            candidates
                .iter()
                .filter_map(|c| {
                    self.match_candidate(query, c).map(|spans| Suggestion {
                        candidate: c.clone(),
                        spans,
                    })
                })
                .collect()
        };

        if self.sort {
            out.sort_by_cached_key(|s| s.candidate.caption.to_lowercase());
        }
        if let Some(max) = self.max_results {
            out.truncate(max);
        }
        out
    }

    /// Spans of an accepted candidate, `None` when rejected.
    pub fn match_candidate(&self, query: &Query, candidate: &Candidate) -> Option<Vec<MatchSpan>> {
        let value_levels = candidate.levels.len();
        let sub_queries = query.levels.len();
        if sub_queries > value_levels {
            return None;
        }

        let mut levels: Vec<Vec<Word>> = candidate.levels.iter().map(|l| words(l)).collect();
        let mut spans = Vec::with_capacity(query.token_count());

        for (sl, tokens) in query.levels.iter().enumerate() {
            let window = sl..=(value_levels - sub_queries + sl);
            for token in tokens {
                let span = window
                    .clone()
                    .find_map(|vl| self.consume(&mut levels[vl], token).map(|(start, end)| MatchSpan { level: vl, start, end }))?;
                spans.push(span);
            }
        }

        spans.sort();
        Some(spans)
    }

    /// Consume the first unconsumed word matching `token`; returns its byte span.
    fn consume(&self, words: &mut [Word], token: &str) -> Option<(usize, usize)> {
        for word in words.iter_mut().filter(|w| !w.consumed) {
            let found = match self.mode {
                WildcardMode::StartsWith => word.lower.starts_with(token).then_some(0),
                WildcardMode::Contains => word.lower.find(token),
            };
            let Some(offset) = found else {
                continue;
            };
            word.consumed = true;
            // Lowercasing changed byte lengths: mark the whole word.
            if word.lower.len() != word.text.len() {
                return Some((word.start, word.start + word.text.len()));
            }
            return Some((word.start + offset, word.start + offset + token.len()));
        }
        None
    }
}
