use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{CommentFilter, CommentsRepo, RepoError, SortSpec};
use crate::domain::entities::CommentRecord;
use crate::domain::types::RecordStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: String,
    parent_id: Option<String>,
    entity_type: String,
    entity_id: String,
    author_id: String,
    content: String,
    status: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    is_edited: bool,
    reply_count: i64,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = String;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        if row.id.is_empty() {
            return Err("empty id".to_string());
        }
        if row.parent_id.as_deref() == Some(row.id.as_str()) {
            return Err("comment is its own parent".to_string());
        }
        let status = RecordStatus::try_from(row.status.as_str())
            .map_err(|()| format!("unknown status `{}`", row.status))?;
        let reply_count = u32::try_from(row.reply_count)
            .map_err(|_| format!("reply count {} out of range", row.reply_count))?;

        Ok(Self {
            id: row.id,
            parent_id: row.parent_id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            author_id: row.author_id,
            content: row.content,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_edited: row.is_edited,
            reply_count,
        })
    }
}

fn into_records(rows: Vec<CommentRow>) -> Vec<CommentRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            CommentRecord::try_from(row)
                .inspect_err(|reason| {
                    warn!(comment_id = %id, reason = %reason, "Dropping malformed comment row");
                })
                .ok()
        })
        .collect()
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn select_page(
        &self,
        filter: &CommentFilter,
        sort: SortSpec,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let mut qb = Self::build_select_query(filter, sort, limit, offset)?;
        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(into_records(rows))
    }

    async fn count(&self, filter: &CommentFilter) -> Result<u64, RepoError> {
        let mut qb = Self::build_count_query(filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
