//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Mirror every event to stdout and to the append-only log file
//!
//! # Design Decisions
//! - The file writer is a `Mutex<File>`, so concurrent events never interleave
//! - An unopenable log file degrades to stdout-only logging, never a crash

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file written to the working directory by default.
pub const DEFAULT_LOG_FILE: &str = "service_log_oscq.txt";

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "oscq_helper=info,tower_http=info";

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
pub fn init(log_path: &Path) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, file_error) = match open_log_file(log_path) {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    match file_error {
        Some(e) => tracing::warn!(
            path = %log_path.display(),
            error = %e,
            "Could not open log file; logging to stdout only"
        ),
        None => tracing::debug!(path = %log_path.display(), "Logging to file"),
    }
}
