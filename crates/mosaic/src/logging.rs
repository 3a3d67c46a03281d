//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// Log output goes to stderr (stdout is reserved for JSON results) and the
/// `RUST_LOG` environment variable overrides `level`.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section, with CLI overrides.
pub fn init_from_config(config: &mosaic_core::Config, verbose: bool, json_logs: bool) {
    let (level, json_format) = resolve(&config.logging, verbose, json_logs);
    init(level, json_format);
}

/// Effective level and format after applying the CLI flags.
fn resolve(
    logging: &mosaic_core::config::LoggingConfig,
    verbose: bool,
    json_logs: bool,
) -> (&str, bool) {
    let level = if verbose && logging.level != "trace" {
        "debug"
    } else {
        logging.level.as_str()
    };
    (level, json_logs || logging.format == "json")
}
