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

pub const INDEX_CACHE_HIT: &str = "yatube_index_cache_hit_total";
pub const INDEX_CACHE_MISS: &str = "yatube_index_cache_miss_total";
pub const INDEX_CACHE_STORE_FAILED: &str = "yatube_index_cache_store_failed_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` directives refine the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("failed to install tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            INDEX_CACHE_HIT,
            Unit::Count,
            "Index page requests answered from the page cache."
        );
        describe_counter!(
            INDEX_CACHE_MISS,
            Unit::Count,
            "Index page requests rendered because no fresh cache entry existed."
        );
        describe_counter!(
            INDEX_CACHE_STORE_FAILED,
            Unit::Count,
            "Rendered index pages that could not be buffered into the cache."
        );
    });
}
