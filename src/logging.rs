// src/logging.rs - tracing subscriber setup
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LogLevel;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns false if a subscriber was already installed, which is expected in
/// tests and harmless elsewhere.
pub fn init_tracing(level: &LogLevel) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level.0));
    let stdout_layer = fmt::layer().with_target(true).with_thread_names(true);

    Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
        .is_ok()
}
