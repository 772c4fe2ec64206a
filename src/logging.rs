//! tracing subscriber setup. Logs go to stderr so stdout stays machine-readable.

use anyhow::{Result, anyhow};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build a filter from a directive such as `warn` or `auditflow=debug,rusqlite=warn`.
pub fn build_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| anyhow!("Invalid log filter '{}': {}", directive, e))
}

/// Level used when the configured directive does not parse.
pub const FALLBACK_FILTER: &str = "warn";

/// Parse `directive`, falling back to [`FALLBACK_FILTER`]. The parse error is
/// handed back so it can be logged once the subscriber is up.
pub fn resolve_filter(directive: &str) -> (EnvFilter, Option<anyhow::Error>) {
    match build_filter(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_FILTER), Some(e)),
    }
}

/// Install the global subscriber. Fails if one is already installed.
///
/// A bad directive never stops the program: logging continues at
/// [`FALLBACK_FILTER`] and a single warning names the rejected value.
pub fn init_tracing(directive: &str, json: bool) -> Result<()> {
    let (filter, invalid) = resolve_filter(directive);
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    if let Some(e) = invalid {
        warn!(filter = %directive, error = %e, "ignoring log filter, using {}", FALLBACK_FILTER);
    }
    Ok(())
}
