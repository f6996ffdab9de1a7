//! Logging configuration with rotation support
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit_core::logging::init_logging;
//!
//! init_logging("logs", "ragkit.log", "info").unwrap();
//! ```

use crate::error::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with daily file rotation
///
/// - `directory`: Directory to store logs
/// - `filename_prefix`: Prefix for log files (e.g. "ragkit.log")
/// - `level`: Default log level (e.g. "info", "debug")
pub fn init_logging(directory: &str, filename_prefix: &str, level: &str) -> Result<()> {
    // 1. File Appender with Rotation (Daily)
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(filename_prefix)
        .build(directory)
        .map_err(|e| {
            crate::error::Error::Internal(format!("Failed to create log appender: {}", e))
        })?;

    // 2. Formatting layers
    // Stdout: Human readable
    let stdout_layer = fmt::layer().with_target(false).compact();

    // File: full text without ANSI escapes
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    // 3. Filter
    // Allow RUST_LOG env var to override, otherwise use default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::error::Error::Internal(format!("Failed to init tracing: {}", e)))?;

    Ok(())
}
