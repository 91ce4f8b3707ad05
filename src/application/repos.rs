//! Repository traits describing the read-side persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{CommentRecord, EntityScope, Reaction, Viewer};
use crate::domain::types::{RecordStatus, SortField, SortOrder, Visibility};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Status predicate of a comment query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    /// `status` is one of the listed values.
    AnyOf(Vec<RecordStatus>),
    /// `status` is one of `public`, or the comment belongs to `owner` and its status is one of
    /// `own`.
    Owned {
        public: Vec<RecordStatus>,
        owner: String,
        own: Vec<RecordStatus>,
    },
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::AnyOf(vec![RecordStatus::Approved])
    }
}

impl StatusFilter {
    /// Statuses a viewer may read, narrowed to `requested` when given.
    ///
    /// Without an explicit request, public readers get approved comments, authors additionally get
    /// all of their own comments, and moderators get every status.
    pub fn for_viewer(viewer: &Viewer, requested: Option<&[RecordStatus]>) -> Self {
        let mut requested =
            requested.map_or_else(|| RecordStatus::ALL.to_vec(), <[RecordStatus]>::to_vec);
        requested.sort();
        requested.dedup();

        let public: Vec<RecordStatus> = requested
            .iter()
            .copied()
            .filter(|status| *status == RecordStatus::Approved)
            .collect();

        match (viewer.visibility, viewer.id()) {
            (Visibility::Moderator, _) => Self::AnyOf(requested),
            (Visibility::Author, Some(owner)) => Self::Owned {
                public,
                owner: owner.to_string(),
                own: requested,
            },
            (Visibility::Author, None) | (Visibility::Public, _) => Self::AnyOf(public),
        }
    }

    pub fn allows(&self, record: &CommentRecord) -> bool {
        match self {
            StatusFilter::AnyOf(statuses) => statuses.contains(&record.status),
            StatusFilter::Owned { public, owner, own } => {
                public.contains(&record.status)
                    || (record.author_id == *owner && own.contains(&record.status))
            }
        }
    }

    /// Stable textual form used in cache keys.
    pub fn describe(&self) -> String {
        fn join(statuses: &[RecordStatus]) -> String {
            statuses
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(",")
        }

        match self {
            StatusFilter::AnyOf(statuses) => join(statuses),
            StatusFilter::Owned { public, owner, own } => {
                format!("{};own={}:{}", join(public), owner, join(own))
            }
        }
    }
}

/// Every predicate a comment query can carry. Fields compose with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub scope: Option<EntityScope>,
    pub statuses: StatusFilter,
    pub roots_only: bool,
    /// Case-insensitive substring of `content`.
    pub content_contains: Option<String>,
    /// Empty means any author.
    pub authors: Vec<String>,
    pub created_from: Option<OffsetDateTime>,
    pub created_to: Option<OffsetDateTime>,
}

impl CommentFilter {
    pub fn matches(&self, record: &CommentRecord) -> bool {
        if let Some(scope) = self.scope.as_ref()
            && (record.entity_type != scope.entity_type || record.entity_id != scope.entity_id)
        {
            return false;
        }
        if self.roots_only && !record.is_top_level() {
            return false;
        }
        if !self.statuses.allows(record) {
            return false;
        }
        if let Some(needle) = self.content_contains.as_ref()
            && !record
                .content
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&record.author_id) {
            return false;
        }
        if self
            .created_from
            .is_some_and(|from| record.created_at < from)
        {
            return false;
        }
        if self.created_to.is_some_and(|to| record.created_at > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// Record Query Interface over stored comments.
#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// One window of matching comments, ordered by `sort` and then by id in the same direction.
    async fn select_page(
        &self,
        filter: &CommentFilter,
        sort: SortSpec,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn count(&self, filter: &CommentFilter) -> Result<u64, RepoError>;
}

/// Viewer Reaction Lookup.
#[async_trait]
pub trait ReactionsRepo: Send + Sync {
    /// Reactions of `viewer_id` to any of `record_ids`. Records without a reaction are absent.
    async fn viewer_reactions(
        &self,
        viewer_id: &str,
        record_ids: &[String],
    ) -> Result<HashMap<String, Reaction>, RepoError>;
}
