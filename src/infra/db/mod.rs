//! Postgres-backed repository implementations.

mod comments;
mod reactions;
mod util;

pub use util::{escape_like, map_sqlx_error};

use std::str::FromStr;
use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
};

use crate::application::repos::{CommentFilter, RepoError, SortSpec, StatusFilter};
use crate::config::DatabaseSettings;
use crate::domain::types::{RecordStatus, SortField};
use crate::infra::error::InfraError;

const COMMENT_COLUMNS: &str = "c.id::text AS id, \
    c.parent_id::text AS parent_id, \
    c.entity_type, \
    c.entity_id::text AS entity_id, \
    c.author_id::text AS author_id, \
    c.content, \
    c.status::text AS status, \
    c.created_at, \
    c.updated_at, \
    c.is_edited, \
    (SELECT COUNT(*) FROM comments r \
        WHERE r.parent_id = c.id AND r.status::text = 'approved') AS reply_count";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pool whose sessions cancel any statement running past the configured timeout.
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| InfraError::configuration("database.url is not set"))?;
        let timeout_ms = settings.statement_timeout.as_millis().to_string();
        let options =
            PgConnectOptions::from_str(url)?.options([("statement_timeout", timeout_ms.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(settings.statement_timeout)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    fn status_texts(statuses: &[RecordStatus]) -> Vec<String> {
        statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect()
    }

    fn apply_status_filter(qb: &mut QueryBuilder<'_, Postgres>, statuses: &StatusFilter) {
        match statuses {
            StatusFilter::AnyOf(allowed) if allowed.is_empty() => {
                qb.push(" AND FALSE");
            }
            StatusFilter::AnyOf(allowed) => {
                qb.push(" AND c.status::text = ANY(");
                qb.push_bind(Self::status_texts(allowed));
                qb.push(")");
            }
            StatusFilter::Owned { public, owner, own } => {
                qb.push(" AND (c.status::text = ANY(");
                qb.push_bind(Self::status_texts(public));
                qb.push(") OR (c.author_id::text = ");
                qb.push_bind(owner.clone());
                qb.push(" AND c.status::text = ANY(");
                qb.push_bind(Self::status_texts(own));
                qb.push(")))");
            }
        }
    }

    fn apply_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CommentFilter) {
        if let Some(scope) = filter.scope.as_ref() {
            qb.push(" AND c.entity_type = ");
            qb.push_bind(scope.entity_type.clone());
            qb.push(" AND c.entity_id::text = ");
            qb.push_bind(scope.entity_id.clone());
        }

        Self::apply_status_filter(qb, &filter.statuses);

        if filter.roots_only {
            qb.push(" AND c.parent_id IS NULL");
        }

        if let Some(needle) = filter.content_contains.as_ref() {
            qb.push(" AND c.content ILIKE ");
            qb.push_bind(format!("%{}%", escape_like(needle)));
        }

        if !filter.authors.is_empty() {
            qb.push(" AND c.author_id::text = ANY(");
            qb.push_bind(filter.authors.clone());
            qb.push(")");
        }

        if let Some(from) = filter.created_from {
            qb.push(" AND c.created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = filter.created_to {
            qb.push(" AND c.created_at <= ");
            qb.push_bind(to);
        }
    }

    fn sort_column(field: SortField) -> &'static str {
        match field {
            SortField::CreatedAt => "c.created_at",
            SortField::UpdatedAt => "c.updated_at",
            SortField::ReplyCount => "reply_count",
        }
    }

    pub(crate) fn build_select_query(
        filter: &CommentFilter,
        sort: SortSpec,
        limit: u32,
        offset: u64,
    ) -> Result<QueryBuilder<'static, Postgres>, RepoError> {
        let offset = i64::try_from(offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {offset} exceeds supported range"),
        })?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM comments c WHERE 1=1");
        Self::apply_filter(&mut qb, filter);

        let direction = sort.order.as_sql();
        qb.push(" ORDER BY ");
        qb.push(Self::sort_column(sort.field));
        qb.push(" ");
        qb.push(direction);
        qb.push(", c.id ");
        qb.push(direction);

        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        Ok(qb)
    }

    pub(crate) fn build_count_query(filter: &CommentFilter) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM comments c WHERE 1=1");
        Self::apply_filter(&mut qb, filter);
        qb
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
