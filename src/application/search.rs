//! Search request shape and predicate construction.

use serde::Deserialize;
use time::OffsetDateTime;

use crate::application::pagination::PageOptions;
use crate::application::repos::{CommentFilter, StatusFilter};
use crate::domain::entities::{EntityScope, Viewer};
use crate::domain::types::RecordStatus;

/// Optional predicates of a search; all of them compose with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub scope: Option<EntityScope>,
    /// Empty means approved only.
    pub statuses: Vec<RecordStatus>,
    pub authors: Vec<String>,
    #[serde(with = "time::serde::timestamp::option")]
    pub date_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::timestamp::option")]
    pub date_to: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub query: String,
    pub filters: SearchFilters,
    pub pagination: PageOptions,
    pub viewer: Viewer,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_pagination(mut self, pagination: PageOptions) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_viewer(mut self, viewer: Viewer) -> Self {
        self.viewer = viewer;
        self
    }

    /// The query with surrounding whitespace removed; `None` when nothing is left.
    pub fn normalized_query(&self) -> Option<&str> {
        let trimmed = self.query.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Combined predicate for a search over every reply depth.
///
/// A reversed date range is swapped rather than producing an empty match.
pub fn search_filter(options: &SearchOptions, query: &str) -> CommentFilter {
    let filters = &options.filters;
    let requested: &[RecordStatus] = if filters.statuses.is_empty() {
        &[RecordStatus::Approved]
    } else {
        &filters.statuses
    };

    let (created_from, created_to) = match (filters.date_from, filters.date_to) {
        (Some(from), Some(to)) if from > to => (Some(to), Some(from)),
        range => range,
    };

    let mut authors = filters.authors.clone();
    authors.sort();
    authors.dedup();

    CommentFilter {
        scope: filters.scope.clone(),
        statuses: StatusFilter::for_viewer(&options.viewer, Some(requested)),
        roots_only: false,
        content_contains: Some(query.to_string()),
        authors,
        created_from,
        created_to,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn defaults_to_approved_content_match() {
        let options = SearchOptions::new("cat");
        let filter = search_filter(&options, "cat");

        assert_eq!(filter.content_contains.as_deref(), Some("cat"));
        assert_eq!(
            filter.statuses,
            StatusFilter::AnyOf(vec![RecordStatus::Approved])
        );
        assert!(!filter.roots_only);
        assert!(filter.scope.is_none());
    }

    #[test]
    fn moderators_may_search_hidden_statuses() {
        let options = SearchOptions::new("cat")
            .with_viewer(Viewer::moderator("m1"))
            .with_filters(SearchFilters {
                statuses: vec![RecordStatus::Flagged, RecordStatus::Hidden],
                ..Default::default()
            });
        let filter = search_filter(&options, "cat");
        assert_eq!(
            filter.statuses,
            StatusFilter::AnyOf(vec![RecordStatus::Flagged, RecordStatus::Hidden])
        );
    }

    #[test]
    fn reversed_date_range_is_swapped() {
        let early = datetime!(2024-01-01 00:00 UTC);
        let late = datetime!(2024-06-01 00:00 UTC);
        let options = SearchOptions::new("cat").with_filters(SearchFilters {
            date_from: Some(late),
            date_to: Some(early),
            authors: vec!["b".into(), "a".into(), "b".into()],
            ..Default::default()
        });

        let filter = search_filter(&options, "cat");
        assert_eq!(filter.created_from, Some(early));
        assert_eq!(filter.created_to, Some(late));
        assert_eq!(filter.authors, ["a", "b"]);
    }

    #[test]
    fn blank_queries_normalize_to_none() {
        assert_eq!(SearchOptions::new("   ").normalized_query(), None);
        assert_eq!(SearchOptions::new(" cat ").normalized_query(), Some("cat"));
    }
}
