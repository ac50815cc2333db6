//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the filter follows the `-q`/`-v`
//! flags. Log lines go to stderr so stdout stays parseable.

use crate::config::Verbosity;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter for `verbosity`
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_log_filter()))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(verbosity: Verbosity) -> bool {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity.is_debug())
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(layer)
        .try_init()
        .is_ok()
}
