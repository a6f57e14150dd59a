//! Telemetry initialization.
//!
//! Diagnostics go to stderr via `tracing`; user-facing results go to stdout
//! and are never logged. The filter comes from `RUST_LOG` (default `warn` so
//! generated output stays clean in pipelines); `PROVENDER_LOG_FORMAT=json`
//! switches the human-readable format to JSON lines.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Call once from `main()`.
pub fn init() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("PROVENDER_LOG_FORMAT").is_ok_and(|v| v == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
