//! Offset pagination: input normalisation and page metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::types::{SortField, SortOrder};

const DEFAULT_LIMIT: u32 = 20;
const DEFAULT_MAX_LIMIT: u32 = 100;
const DEFAULT_MAX_DEPTH: u32 = 3;

/// Bounds applied to every page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    pub max_depth: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl From<&crate::config::PaginationSettings> for PaginationConfig {
    fn from(settings: &crate::config::PaginationSettings) -> Self {
        Self {
            default_limit: settings.default_limit.get(),
            max_limit: settings.max_limit.get(),
            max_depth: settings.max_depth,
        }
    }
}

/// Page request exactly as a caller supplied it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub include_replies: Option<bool>,
    pub max_depth: Option<i64>,
}

impl PageOptions {
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn max_depth(mut self, max_depth: i64) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn include_replies(mut self, include: bool) -> Self {
        self.include_replies = Some(include);
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, sort_order: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = Some(sort_order.into());
        self
    }
}

/// A page request after clamping against [`PaginationConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidatedPage {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub include_replies: bool,
    pub max_depth: u32,
}

impl ValidatedPage {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl fmt::Display for ValidatedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page={} limit={} sort={}:{} include_replies={} max_depth={}",
            self.page,
            self.limit,
            self.sort_by.as_str(),
            self.sort_order.as_str(),
            self.include_replies,
            self.max_depth
        )
    }
}

/// Normalise caller input. Never fails: out-of-range or malformed values are clamped or replaced
/// by their defaults.
pub fn validate(options: &PageOptions, config: &PaginationConfig) -> ValidatedPage {
    let max_limit = config.max_limit.max(1);

    let page = options
        .page
        .unwrap_or(1)
        .clamp(1, i64::from(u32::MAX)) as u32;

    let limit = options
        .limit
        .unwrap_or(i64::from(config.default_limit))
        .clamp(1, i64::from(max_limit)) as u32;

    let max_depth = options.max_depth.map_or(config.max_depth, |requested| {
        requested.clamp(0, i64::from(config.max_depth)) as u32
    });

    let sort_by = match options.sort_by.as_deref() {
        None => SortField::default(),
        Some(raw) => SortField::try_from(raw).unwrap_or_else(|()| {
            debug!(sort_by = raw, "Unknown sort field, falling back to default");
            SortField::default()
        }),
    };

    let sort_order = match options.sort_order.as_deref() {
        None => SortOrder::default(),
        Some(raw) => SortOrder::try_from(raw).unwrap_or_else(|()| {
            debug!(sort_order = raw, "Unknown sort order, falling back to default");
            SortOrder::default()
        }),
    };

    ValidatedPage {
        page,
        limit,
        sort_by,
        sort_order,
        include_replies: options.include_replies.unwrap_or(true),
        max_depth,
    }
}

/// Position of a page within the full result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit_wide = u64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_wide),
            has_next: u64::from(page).saturating_mul(limit_wide) < total,
            has_prev: page > 1,
        }
    }

    pub fn for_page(page: &ValidatedPage, total: u64) -> Self {
        Self::new(page.page, page.limit, total)
    }
}
