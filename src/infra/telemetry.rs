use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Registry, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::threads::{METRIC_QUERY_MS, METRIC_SEARCH_MS};
use crate::cache::{
    METRIC_CACHE_EVICT_TOTAL, METRIC_CACHE_EXPIRED_TOTAL, METRIC_CACHE_HIT_TOTAL,
    METRIC_CACHE_MISS_TOTAL, METRIC_CACHE_SIZE_BYTES,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

/// Install the global subscriber and register the engine's metric descriptions.
///
/// `RUST_LOG` directives refine `logging.level`. Calling this twice fails with
/// [`InfraError::Telemetry`].
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(output_layer(logging.format))
        .with(env_filter)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber already set: {err}")))?;

    describe_metrics();
    info!(
        level = %logging.level,
        json = matches!(logging.format, LogFormat::Json),
        "Telemetry initialised"
    );
    Ok(())
}

/// Register units and help text for every metric the engine emits. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of result cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of result cache misses, expired entries included."
        );
        describe_counter!(
            METRIC_CACHE_EVICT_TOTAL,
            Unit::Count,
            "Total number of result cache entries evicted to stay within the size limit."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRED_TOTAL,
            Unit::Count,
            "Total number of result cache entries removed after their TTL."
        );
        describe_gauge!(
            METRIC_CACHE_SIZE_BYTES,
            Unit::Bytes,
            "Aggregate serialized size of all stored results."
        );
        describe_histogram!(
            METRIC_QUERY_MS,
            Unit::Milliseconds,
            "Uncached thread page latency in milliseconds."
        );
        describe_histogram!(
            METRIC_SEARCH_MS,
            Unit::Milliseconds,
            "Uncached comment search latency in milliseconds."
        );
    });
}

#[cfg(test)]
mod tests {
    use metrics_util::debugging::DebuggingRecorder;

    use super::*;

    #[test]
    fn output_layer_builds_for_every_format() {
        let _ = output_layer(LogFormat::Json);
        let _ = output_layer(LogFormat::Compact);
    }

    #[test]
    fn describing_metrics_twice_is_harmless() {
        let recorder = DebuggingRecorder::new();
        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            describe_metrics();
        });
    }
}
