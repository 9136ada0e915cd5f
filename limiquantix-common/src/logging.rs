//! Logging initialization using tracing.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the tracing subscriber with the specified log level.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
/// * `level` - Log level string (trace, debug, info, warn, error)
///
/// # Example
/// ```
/// limiquantix_common::init_logging("info").unwrap();
/// ```
pub fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()?;

    Ok(())
}

/// Initialize logging with JSON output format.
/// Suitable for production environments with log aggregation.
pub fn init_logging_json(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .try_init()?;

    Ok(())
}

/// Initialize test-friendly logging, ignoring an already installed
/// subscriber. Output goes through the test harness capture.
pub fn try_init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init();
}
