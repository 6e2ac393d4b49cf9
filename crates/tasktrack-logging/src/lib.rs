//! # tasktrack-logging
//!
//! Logging for the tasktrack workspace tracker.
//!
//! ## Key Types
//!
//! - [`EventLogger`] - Structured tracker event output
//! - [`TrackerEvent`] - Event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostic `tracing` output goes to stderr, and optionally to a daily
//! rolling file when a log directory is given to [`init_tracing`].

mod events;

pub use events::{EventLogger, LogFormat, TrackerEvent};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// When `log_dir` is set, events are also written as JSON to
/// `log_dir/tasktrack.log.<date>`; keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init_tracing(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tasktrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    match format {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .init();
        }
    }

    guard
}

/// Default directory for log files: `<data dir>/tasktrack/logs`
pub fn default_log_dir() -> Option<std::path::PathBuf> {
    dirs::data_dir().map(|d| d.join("tasktrack").join("logs"))
}
