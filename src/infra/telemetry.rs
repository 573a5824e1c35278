use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "storefront_cache_hit_total",
            Unit::Count,
            "Total number of catalog cache hits."
        );
        describe_counter!(
            "storefront_cache_miss_total",
            Unit::Count,
            "Total number of catalog cache misses, including failed reads."
        );
        describe_counter!(
            "storefront_cache_decode_error_total",
            Unit::Count,
            "Total number of cached values that could not be decoded."
        );
        describe_counter!(
            "storefront_cache_write_error_total",
            Unit::Count,
            "Total number of detached cache writes that failed."
        );
        describe_counter!(
            "storefront_cache_evict_total",
            Unit::Count,
            "Total number of in-process cache evictions due to capacity."
        );
        describe_counter!(
            "storefront_fetch_failed_total",
            Unit::Count,
            "Total number of catalog computations that failed after a miss."
        );
        describe_counter!(
            "storefront_rate_limited_total",
            Unit::Count,
            "Total number of requests denied by the rate gate, by limiter class."
        );
    });
}
