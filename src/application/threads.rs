//! Cache-first facade over thread pagination and comment search.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::application::error::ThreadError;
use crate::application::fetch::{RowFetcher, thread_filter};
use crate::application::pagination::{
    PageMeta, PageOptions, PaginationConfig, ValidatedPage, validate,
};
use crate::application::repos::{CommentFilter, ReactionsRepo, RepoError};
use crate::application::search::{SearchOptions, search_filter};
use crate::cache::{CacheConfig, CacheKeyBuilder, CacheStats, TtlStore, spawn_cleanup};
use crate::domain::entities::{EntityScope, Reaction, Viewer};
use crate::domain::highlight::extract_highlights;
use crate::domain::threads::{
    ThreadNode, TreeOptions, annotate_for_viewer, build_thread_tree, collect_ids,
};

pub const OP_PAGE: &str = "comments.page";
pub const OP_SEARCH: &str = "comments.search";

pub const METRIC_QUERY_MS: &str = "remarque_query_ms";
pub const METRIC_SEARCH_MS: &str = "remarque_search_ms";

const SOURCE: &str = "application::threads";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub items: Vec<ThreadNode>,
    #[serde(flatten)]
    pub meta: PageMeta,
    pub query_time_ms: f64,
    pub cache_hit: bool,
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching comments as flat nodes.
    pub items: Vec<ThreadNode>,
    /// Snippets per comment id; comments without a highlighted term are absent.
    pub highlights: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub meta: PageMeta,
    pub search_time_ms: f64,
    pub cache_hit: bool,
    pub cache_key: String,
}

/// Payload stored in the result cache.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedResult {
    Page(PageResult),
    Search(SearchResult),
}

pub type ResultCache = TtlStore<CachedResult>;

pub struct ThreadService {
    fetcher: RowFetcher,
    reactions: Option<Arc<dyn ReactionsRepo>>,
    cache: Arc<ResultCache>,
    cache_config: CacheConfig,
    pagination: PaginationConfig,
}

impl ThreadService {
    pub fn new(
        fetcher: RowFetcher,
        cache: Arc<ResultCache>,
        cache_config: CacheConfig,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            fetcher,
            reactions: None,
            cache,
            cache_config,
            pagination,
        }
    }

    pub fn with_reactions(mut self, reactions: Arc<dyn ReactionsRepo>) -> Self {
        self.reactions = Some(reactions);
        self
    }

    /// Start the periodic expiry sweep, unless the cache is disabled or the interval is zero.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        if !self.cache_config.enabled {
            return None;
        }
        let interval = self.cache_config.cleanup_interval()?;
        Some(spawn_cleanup(Arc::clone(&self.cache), interval))
    }

    /// One page of a thread's root comments with their replies attached.
    #[instrument(skip_all, fields(scope = %scope))]
    pub async fn get_paginated(
        &self,
        scope: &EntityScope,
        options: &PageOptions,
        viewer: &Viewer,
    ) -> Result<PageResult, ThreadError> {
        let started = Instant::now();
        let page = validate(options, &self.pagination);
        let filter = thread_filter(scope, viewer, &page);
        let cache_key = page_key(scope, &page, viewer, &filter);

        if let Some(CachedResult::Page(mut hit)) = self.lookup(&cache_key) {
            hit.cache_hit = true;
            return Ok(hit);
        }

        let fetched = self
            .fetcher
            .fetch(&filter, &page)
            .await
            .map_err(|source| query_failed(OP_PAGE, scope.to_string(), &page, source))?;

        let mut items = build_thread_tree(
            fetched.rows,
            TreeOptions {
                max_depth: page.max_depth,
                include_replies: page.include_replies,
            },
        );
        if let Some(viewer_id) = viewer.id() {
            self.annotate(&mut items, viewer_id).await;
        }

        let query_time_ms = elapsed_ms(started);
        histogram!(METRIC_QUERY_MS).record(query_time_ms);

        let result = PageResult {
            items,
            meta: PageMeta::for_page(&page, fetched.total),
            query_time_ms,
            cache_hit: false,
            cache_key,
        };
        self.store(&result.cache_key, CachedResult::Page(result.clone()));
        Ok(result)
    }

    /// Case-insensitive substring search with per-comment highlight snippets.
    #[instrument(skip_all, fields(query = %options.query))]
    pub async fn search(&self, options: &SearchOptions) -> Result<SearchResult, ThreadError> {
        let started = Instant::now();
        let page = validate(&options.pagination, &self.pagination);

        let Some(query) = options.normalized_query() else {
            debug!("Blank search query, returning an empty result");
            return Ok(SearchResult {
                items: Vec::new(),
                highlights: BTreeMap::new(),
                meta: PageMeta::for_page(&page, 0),
                search_time_ms: elapsed_ms(started),
                cache_hit: false,
                cache_key: search_key(options, "", &page, None),
            });
        };

        let filter = search_filter(options, query);
        let cache_key = search_key(options, query, &page, Some(&filter));

        if let Some(CachedResult::Search(mut hit)) = self.lookup(&cache_key) {
            hit.cache_hit = true;
            return Ok(hit);
        }

        let scope = options
            .filters
            .scope
            .as_ref()
            .map_or_else(|| "all".to_string(), ToString::to_string);
        let fetched = self
            .fetcher
            .fetch(&filter, &page)
            .await
            .map_err(|source| query_failed(OP_SEARCH, scope, &page, source))?;

        let highlights = extract_highlights(
            fetched
                .rows
                .iter()
                .map(|record| (record.id.as_str(), record.content.as_str())),
            query,
        );
        let mut items: Vec<ThreadNode> = fetched.rows.into_iter().map(ThreadNode::leaf).collect();
        if let Some(viewer_id) = options.viewer.id() {
            self.annotate(&mut items, viewer_id).await;
        }

        let search_time_ms = elapsed_ms(started);
        histogram!(METRIC_SEARCH_MS).record(search_time_ms);

        let result = SearchResult {
            items,
            highlights,
            meta: PageMeta::for_page(&page, fetched.total),
            search_time_ms,
            cache_hit: false,
            cache_key,
        };
        self.store(&result.cache_key, CachedResult::Search(result.clone()));
        Ok(result)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cleanup_expired(&self) -> usize {
        let removed = self.cache.cleanup_expired();
        debug!(target_module = SOURCE, removed, "Cleaned up expired results");
        removed
    }

    fn lookup(&self, key: &str) -> Option<CachedResult> {
        if !self.cache_config.enabled {
            return None;
        }
        self.cache.get(key)
    }

    fn store(&self, key: &str, value: CachedResult) {
        if !self.cache_config.enabled {
            return;
        }
        if let Err(err) = self.cache.put(key, value, self.cache_config.ttl()) {
            warn!(
                target_module = SOURCE,
                kind = "CacheWriteFailed",
                cache_key = key,
                error = %err,
                "Result not cached"
            );
        }
    }

    /// Viewer flags for every node. A failing, slow or absent reaction lookup counts as no
    /// reaction.
    async fn annotate(&self, items: &mut [ThreadNode], viewer_id: &str) {
        let reactions = match self.reactions.as_ref() {
            Some(repo) if !items.is_empty() => {
                let ids = collect_ids(items);
                let deadline = self.fetcher.timeout();
                let lookup = repo.viewer_reactions(viewer_id, &ids);
                match tokio::time::timeout(deadline, lookup).await {
                    Ok(Ok(reactions)) => reactions,
                    Ok(Err(err)) => {
                        warn!(
                            target_module = SOURCE,
                            viewer_id,
                            error = %err,
                            "Reaction lookup failed, continuing without reactions"
                        );
                        HashMap::new()
                    }
                    Err(_) => {
                        warn!(
                            target_module = SOURCE,
                            viewer_id,
                            timeout_ms = deadline.as_millis() as u64,
                            "Reaction lookup exceeded its deadline, continuing without reactions"
                        );
                        HashMap::new()
                    }
                }
            }
            _ => HashMap::<String, Reaction>::new(),
        };
        annotate_for_viewer(items, viewer_id, &reactions);
    }
}

fn query_failed(
    operation: &'static str,
    scope: String,
    page: &ValidatedPage,
    source: RepoError,
) -> ThreadError {
    let options = page.to_string();
    error!(
        target_module = SOURCE,
        operation,
        scope = %scope,
        options = %options,
        error = %source,
        "Comment query failed"
    );
    ThreadError::QueryFailed {
        operation,
        scope,
        options,
        source,
    }
}

fn viewer_params(builder: CacheKeyBuilder, viewer: &Viewer) -> CacheKeyBuilder {
    builder
        .opt_param("viewer", viewer.id())
        .param("visibility", viewer.visibility.as_str())
}

fn page_key(
    scope: &EntityScope,
    page: &ValidatedPage,
    viewer: &Viewer,
    filter: &CommentFilter,
) -> String {
    let builder = CacheKeyBuilder::new(OP_PAGE)
        .param("scope", scope)
        .param("page", page.page)
        .param("limit", page.limit)
        .param("sort_by", page.sort_by.as_str())
        .param("sort_order", page.sort_order.as_str())
        .param("include_replies", page.include_replies)
        .param("max_depth", page.max_depth)
        .param("statuses", filter.statuses.describe());
    viewer_params(builder, viewer).build()
}

fn search_key(
    options: &SearchOptions,
    query: &str,
    page: &ValidatedPage,
    filter: Option<&CommentFilter>,
) -> String {
    let builder = CacheKeyBuilder::new(OP_SEARCH)
        .param("query", query)
        .param("page", page.page)
        .param("limit", page.limit)
        .param("sort_by", page.sort_by.as_str())
        .param("sort_order", page.sort_order.as_str())
        .opt_param("scope", options.filters.scope.as_ref())
        .list_param(
            "authors",
            filter.map(|filter| filter.authors.as_slice()).unwrap_or(&[]),
        )
        .opt_param(
            "date_from",
            filter
                .and_then(|filter| filter.created_from)
                .map(|from| from.unix_timestamp()),
        )
        .opt_param(
            "date_to",
            filter
                .and_then(|filter| filter.created_to)
                .map(|to| to.unix_timestamp()),
        )
        .opt_param("statuses", filter.map(|filter| filter.statuses.describe()));
    viewer_params(builder, &options.viewer).build()
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::search::SearchFilters;

    fn page_for(options: PageOptions) -> ValidatedPage {
        validate(&options, &PaginationConfig::default())
    }

    fn key_for(page: &ValidatedPage, viewer: &Viewer) -> String {
        let scope = EntityScope::new("post", "1");
        let filter = thread_filter(&scope, viewer, page);
        page_key(&scope, page, viewer, &filter)
    }

    #[test]
    fn page_key_reflects_viewer_and_visibility() {
        let page = page_for(PageOptions::default());
        let anonymous = key_for(&page, &Viewer::anonymous());
        let member = key_for(&page, &Viewer::member("u1"));
        let other = key_for(&page, &Viewer::member("u2"));
        let author = key_for(&page, &Viewer::author("u1"));

        assert!(anonymous.starts_with("comments.page:"));
        assert_ne!(anonymous, member);
        assert_ne!(member, other);
        assert_ne!(member, author);
    }

    #[test]
    fn page_key_reflects_validated_options() {
        let base = key_for(&page_for(PageOptions::default()), &Viewer::anonymous());
        for options in [
            PageOptions::default().page(2),
            PageOptions::default().limit(5),
            PageOptions::default().max_depth(1),
            PageOptions::default().include_replies(false),
            PageOptions::default().sort("updated_at", "desc"),
            PageOptions::default().sort("created_at", "asc"),
        ] {
            assert_ne!(base, key_for(&page_for(options), &Viewer::anonymous()));
        }

        let clamped = key_for(&page_for(PageOptions::default().page(-3)), &Viewer::anonymous());
        assert_eq!(base, clamped);
    }

    #[test]
    fn search_key_reflects_filters() {
        let page = page_for(PageOptions::default());
        let key = |options: &SearchOptions| {
            let query = options.normalized_query().unwrap_or_default();
            let filter = search_filter(options, query);
            search_key(options, query, &page, Some(&filter))
        };

        let base = SearchOptions::new("cat");
        let reference = key(&base);
        assert!(reference.starts_with("comments.search:"));
        assert_ne!(reference, key(&SearchOptions::new("dog")));
        assert_ne!(
            reference,
            key(&base.clone().with_filters(SearchFilters {
                authors: vec!["a1".into()],
                ..Default::default()
            }))
        );
        assert_ne!(
            reference,
            key(&base.clone().with_filters(SearchFilters {
                scope: Some(EntityScope::new("post", "1")),
                ..Default::default()
            }))
        );
        assert_ne!(
            reference,
            key(&base.clone().with_viewer(Viewer::member("u1")))
        );
    }

    #[test]
    fn cached_results_serialize_with_a_kind_tag() {
        let result = PageResult {
            items: Vec::new(),
            meta: PageMeta::new(1, 20, 0),
            query_time_ms: 1.5,
            cache_hit: false,
            cache_key: "comments.page:".to_string(),
        };
        let value = serde_json::to_value(CachedResult::Page(result)).unwrap();
        assert_eq!(value["kind"], "page");
        assert_eq!(value["total_pages"], 0);
        assert_eq!(value["cache_hit"], false);
    }
}
