use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_FILTER: &str = "finsight=info,tower_http=info";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber: bunyan JSON lines for `Json`, human-readable text otherwise.
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let (storage, bunyan, text) = match format {
        LogFormat::Json => (
            Some(JsonStorageLayer),
            Some(BunyanFormattingLayer::new("finsight".into(), std::io::stdout)),
            None,
        ),
        LogFormat::Text => (None, None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(storage)
        .with(bunyan)
        .with(text)
        .try_init()
}
