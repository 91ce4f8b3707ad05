//! Shared domain enumerations aligned with persisted comment columns.

use serde::{Deserialize, Serialize};

/// Moderation status of a stored comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
    Flagged,
    Hidden,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 5] = [
        RecordStatus::Pending,
        RecordStatus::Approved,
        RecordStatus::Rejected,
        RecordStatus::Flagged,
        RecordStatus::Hidden,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
            RecordStatus::Flagged => "flagged",
            RecordStatus::Hidden => "hidden",
        }
    }
}

impl TryFrom<&str> for RecordStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(RecordStatus::Pending),
            "approved" => Ok(RecordStatus::Approved),
            "rejected" => Ok(RecordStatus::Rejected),
            "flagged" => Ok(RecordStatus::Flagged),
            "hidden" => Ok(RecordStatus::Hidden),
            _ => Err(()),
        }
    }
}

/// Column a comment page is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    ReplyCount,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::ReplyCount => "reply_count",
        }
    }
}

impl TryFrom<&str> for SortField {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "created_at" | "createdAt" => Ok(SortField::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortField::UpdatedAt),
            "reply_count" | "replyCount" => Ok(SortField::ReplyCount),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl TryFrom<&str> for SortOrder {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(()),
        }
    }
}

/// Which statuses a reader is entitled to see.
///
/// `Public` readers only ever see approved comments. `Author` readers additionally see their own
/// comments in any status. `Moderator` readers see every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Author,
    Moderator,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Author => "author",
            Visibility::Moderator => "moderator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in RecordStatus::ALL {
            assert_eq!(RecordStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(RecordStatus::try_from("deleted").is_err());
    }

    #[test]
    fn sort_field_accepts_camel_case_aliases() {
        assert_eq!(SortField::try_from("createdAt"), Ok(SortField::CreatedAt));
        assert_eq!(SortField::try_from("reply_count"), Ok(SortField::ReplyCount));
        assert!(SortField::try_from("likes").is_err());
    }

    #[test]
    fn sort_order_is_case_insensitive() {
        assert_eq!(SortOrder::try_from("ASC"), Ok(SortOrder::Asc));
        assert_eq!(SortOrder::try_from("Desc"), Ok(SortOrder::Desc));
        assert!(SortOrder::try_from("sideways").is_err());
    }
}
