//! Read-only views of persisted comment data.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::{RecordStatus, Visibility};

/// The thread a comment belongs to, e.g. `post:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityScope {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityScope {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub author_id: String,
    pub content: String,
    pub status: RecordStatus,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
    pub is_edited: bool,
    /// Approved direct replies, derived by the query layer.
    pub reply_count: u32,
}

impl CommentRecord {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A viewer's reaction to one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reaction {
    pub liked: bool,
    pub disliked: bool,
}

/// Identity and entitlement of whoever is reading a thread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Viewer {
    pub id: Option<String>,
    pub visibility: Visibility,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A signed-in reader who only sees approved comments.
    pub fn member(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            visibility: Visibility::Public,
        }
    }

    /// A signed-in reader who also sees their own comments in any status.
    pub fn author(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            visibility: Visibility::Author,
        }
    }

    pub fn moderator(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            visibility: Visibility::Moderator,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
