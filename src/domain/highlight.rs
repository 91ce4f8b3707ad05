//! Search-term snippet extraction.

use std::collections::BTreeMap;

/// Terms shorter than this are not highlighted.
pub const MIN_TERM_CHARS: usize = 3;
/// Characters kept on each side of a match.
pub const SNIPPET_CONTEXT_CHARS: usize = 30;
pub const ELLIPSIS: &str = "...";

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Split a query into case-folded highlight terms.
///
/// Terms shorter than [`MIN_TERM_CHARS`] are discarded; repeated terms are kept once, in order
/// of first appearance.
pub fn query_terms(query: &str) -> Vec<Vec<char>> {
    let mut terms: Vec<Vec<char>> = Vec::new();
    for word in query.split_whitespace() {
        let term: Vec<char> = word.chars().map(fold).collect();
        if term.len() >= MIN_TERM_CHARS && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// One snippet per term that occurs in `content`, in term order.
///
/// Each snippet is the first case-insensitive occurrence of the term widened by
/// [`SNIPPET_CONTEXT_CHARS`] on both sides, clamped to the content and wrapped in [`ELLIPSIS`].
pub fn snippets_for(content: &str, terms: &[Vec<char>]) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();

    terms
        .iter()
        .filter(|term| !term.is_empty() && term.len() <= folded.len())
        .filter_map(|term| {
            let position = folded
                .windows(term.len())
                .position(|window| window == term.as_slice())?;
            let start = position.saturating_sub(SNIPPET_CONTEXT_CHARS);
            let end = (position + term.len() + SNIPPET_CONTEXT_CHARS).min(chars.len());
            let excerpt: String = chars[start..end].iter().collect();
            Some(format!("{ELLIPSIS}{excerpt}{ELLIPSIS}"))
        })
        .collect()
}

/// Snippets keyed by record id; records without any match are left out.
pub fn extract_highlights<'a, I>(records: I, query: &str) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let terms = query_terms(query);
    let mut highlights = BTreeMap::new();
    if terms.is_empty() {
        return highlights;
    }

    for (id, content) in records {
        let snippets = snippets_for(content, &terms);
        if !snippets.is_empty() {
            highlights.insert(id.to_string(), snippets);
        }
    }
    highlights
}
