//! Bounded page reads against the comment store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{instrument, warn};

use crate::application::pagination::ValidatedPage;
use crate::application::repos::{CommentFilter, CommentsRepo, RepoError, SortSpec, StatusFilter};
use crate::domain::entities::{CommentRecord, EntityScope, Viewer};

/// One window of rows plus the size of the whole matching set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRows {
    pub rows: Vec<CommentRecord>,
    pub total: u64,
}

/// Predicate for reading one thread as `viewer`.
pub fn thread_filter(scope: &EntityScope, viewer: &Viewer, page: &ValidatedPage) -> CommentFilter {
    CommentFilter {
        scope: Some(scope.clone()),
        statuses: StatusFilter::for_viewer(viewer, None),
        roots_only: !page.include_replies,
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct RowFetcher {
    comments: Arc<dyn CommentsRepo>,
    timeout: Duration,
}

impl RowFetcher {
    pub fn new(comments: Arc<dyn CommentsRepo>, timeout: Duration) -> Self {
        Self { comments, timeout }
    }

    /// Deadline applied to every backing-store round trip.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Select the page window and count the full match set concurrently.
    ///
    /// Both queries share the same predicate, so `total` stays meaningful when the window is empty.
    #[instrument(skip_all, fields(page = page.page, limit = page.limit))]
    pub async fn fetch(
        &self,
        filter: &CommentFilter,
        page: &ValidatedPage,
    ) -> Result<FetchedRows, RepoError> {
        let sort = SortSpec {
            field: page.sort_by,
            order: page.sort_order,
        };
        let select = self
            .comments
            .select_page(filter, sort, page.limit, page.offset());
        let count = self.comments.count(filter);

        match tokio::time::timeout(self.timeout, async { tokio::try_join!(select, count) }).await {
            Ok(Ok((rows, total))) => Ok(FetchedRows { rows, total }),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Comment query exceeded its deadline"
                );
                Err(RepoError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::pagination::{PageOptions, PaginationConfig, validate};
    use crate::domain::types::{RecordStatus, SortField, SortOrder};

    #[derive(Default)]
    struct RecordingRepo {
        calls: Mutex<Vec<(SortSpec, u32, u64)>>,
        total: u64,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl CommentsRepo for RecordingRepo {
        async fn select_page(
            &self,
            _filter: &CommentFilter,
            sort: SortSpec,
            limit: u32,
            offset: u64,
        ) -> Result<Vec<CommentRecord>, RepoError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push((sort, limit, offset));
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &CommentFilter) -> Result<u64, RepoError> {
            Ok(self.total)
        }
    }

    fn page(options: PageOptions) -> ValidatedPage {
        validate(&options, &PaginationConfig::default())
    }

    #[tokio::test]
    async fn forwards_window_and_reports_independent_total() {
        let repo = Arc::new(RecordingRepo {
            total: 45,
            ..Default::default()
        });
        let fetcher = RowFetcher::new(repo.clone(), Duration::from_secs(1));
        let page = page(PageOptions::default().page(3).limit(20).sort("reply_count", "asc"));

        let fetched = fetcher
            .fetch(&CommentFilter::default(), &page)
            .await
            .unwrap();

        assert!(fetched.rows.is_empty());
        assert_eq!(fetched.total, 45);
        let calls = repo.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [(
                SortSpec {
                    field: SortField::ReplyCount,
                    order: SortOrder::Asc
                },
                20,
                40
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let repo = Arc::new(RecordingRepo {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let fetcher = RowFetcher::new(repo.clone(), Duration::from_secs(5));

        let err = fetcher
            .fetch(&CommentFilter::default(), &page(PageOptions::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::Timeout));
        assert!(repo.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn thread_filter_restricts_roots_when_replies_are_excluded() {
        let scope = EntityScope::new("post", "1");
        let flat = page(PageOptions::default().include_replies(false));
        let filter = thread_filter(&scope, &Viewer::anonymous(), &flat);
        assert!(filter.roots_only);
        assert_eq!(filter.scope, Some(scope.clone()));
        assert_eq!(
            filter.statuses,
            StatusFilter::AnyOf(vec![RecordStatus::Approved])
        );

        let threaded = page(PageOptions::default());
        assert!(!thread_filter(&scope, &Viewer::anonymous(), &threaded).roots_only);
    }
}
