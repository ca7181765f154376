//! Log sink setup.
//!
//! Every request and decision record goes to a single append-only file. The
//! file is opened (and created if needed) once at startup; records are handed
//! to a background writer thread one complete line at a time.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Opens `path` for appending, creating it when absent.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Filter from `RUST_LOG`, defaulting to `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber writing into the file at `path`.
///
/// The returned guard flushes pending records when dropped and must be held
/// until the process exits.
pub fn init_logging(path: &Path, json: bool) -> io::Result<WorkerGuard> {
    let file = open_log_file(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer);

    let installed = if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(io::Error::other)?;

    Ok(guard)
}
