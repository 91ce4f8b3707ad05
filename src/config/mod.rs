//! Configuration layer: typed settings with layered precedence (file → env).

use std::{
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::Path,
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "remarque";
const ENV_PREFIX: &str = "REMARQUE";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
const DEFAULT_CACHE_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_CACHE_CLEANUP_INTERVAL_MS: u64 = 60_000;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_MAX_DEPTH: u32 = 3;
const MAX_SUPPORTED_DEPTH: u32 = 16;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub pagination: PaginationSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_ms: NonZeroU64,
    pub max_size_bytes: NonZeroUsize,
    /// Zero disables the periodic sweep.
    pub cleanup_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub default_limit: NonZeroU32,
    pub max_limit: NonZeroU32,
    pub max_depth: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (defaults → files → environment).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    pagination: RawPaginationSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u64>,
    statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_ms: Option<u64>,
    max_size_bytes: Option<u64>,
    cleanup_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPaginationSettings {
    default_limit: Option<u64>,
    max_limit: Option<u64>,
    max_depth: Option<u64>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            pagination,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            pagination: build_pagination_settings(pagination)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS.into()),
        "database.max_connections",
    )?;

    let timeout_ms = database
        .statement_timeout_ms
        .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "database.statement_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        statement_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_ms = NonZeroU64::new(cache.ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS))
        .ok_or_else(|| LoadError::invalid("cache.ttl_ms", "must be greater than zero"))?;

    let max_size_value = cache
        .max_size_bytes
        .unwrap_or(DEFAULT_CACHE_MAX_SIZE_BYTES);
    let max_size_usize = usize::try_from(max_size_value).map_err(|_| {
        LoadError::invalid(
            "cache.max_size_bytes",
            "value exceeds supported range for usize",
        )
    })?;
    let max_size_bytes = NonZeroUsize::new(max_size_usize)
        .ok_or_else(|| LoadError::invalid("cache.max_size_bytes", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl_ms,
        max_size_bytes,
        cleanup_interval_ms: cache
            .cleanup_interval_ms
            .unwrap_or(DEFAULT_CACHE_CLEANUP_INTERVAL_MS),
    })
}

fn build_pagination_settings(
    pagination: RawPaginationSettings,
) -> Result<PaginationSettings, LoadError> {
    let default_limit = non_zero_u32(
        pagination
            .default_limit
            .unwrap_or(DEFAULT_PAGE_LIMIT.into()),
        "pagination.default_limit",
    )?;
    let max_limit = non_zero_u32(
        pagination
            .max_limit
            .unwrap_or(DEFAULT_MAX_PAGE_LIMIT.into()),
        "pagination.max_limit",
    )?;
    if default_limit > max_limit {
        return Err(LoadError::invalid(
            "pagination.default_limit",
            format!("must not exceed pagination.max_limit ({max_limit})"),
        ));
    }

    let max_depth = pagination.max_depth.unwrap_or(DEFAULT_MAX_DEPTH.into());
    if max_depth > u64::from(MAX_SUPPORTED_DEPTH) {
        return Err(LoadError::invalid(
            "pagination.max_depth",
            format!("must be at most {MAX_SUPPORTED_DEPTH}"),
        ));
    }

    Ok(PaginationSettings {
        default_limit,
        max_limit,
        max_depth: max_depth as u32,
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
