//! Diagnostic tracing for debugging the CLI.
//!
//! Tracing goes to stderr and is separate from what actions print: product
//! output always goes through the action console.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Level variable consulted when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "CODECRAFTERS_LOG_LEVEL";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, then [`LOG_LEVEL_ENV`]; defaults to `warn`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// CODECRAFTERS_LOG_LEVEL=debug codecrafters run actions.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_directive(std::env::var(LOG_LEVEL_ENV).ok())))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn fallback_directive(level: Option<String>) -> String {
    level
        .map(|level| level.trim().to_ascii_lowercase())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| "warn".to_string())
}
