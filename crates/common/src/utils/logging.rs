use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: request spans at info, backend call
/// details from the service crate at debug.
const DEFAULT_FILTER: &str = "info,tower_http=info,service=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Compact human-readable logs on stdout.
pub fn init_logging_default() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// One JSON object per event on stdout, for log shippers.
pub fn init_logging_json() {
    // 可通过 RUST_LOG 覆盖，例如 RUST_LOG=info,service::integration=trace
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_writer(io::stdout)
        .try_init();
}

/// Pick the JSON or compact format from `LOG_FORMAT` (`json` selects JSON).
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging_from_env() {
    match std::env::var("LOG_FORMAT") {
        Ok(v) if v.eq_ignore_ascii_case("json") => init_logging_json(),
        _ => init_logging_default(),
    }
}
