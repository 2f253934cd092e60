//! Logging init: stderr plus a per-input log file, or stderr alone as a fallback.
//!
//! Only the binary installs a subscriber. The library just emits `tracing` events.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::error::{Error, Result};
use crate::utils::{input_stem, input_work_dir};

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "info";

/// Path of the log file for `input`: `<input without extension>/<input stem>.log`
pub fn log_file_path(input: &Path) -> PathBuf {
    input_work_dir(input).join(format!("{}.log", input_stem(input)))
}

/// Initialize structured logging to stderr and to the log file for `input`.
///
/// The log file is opened in append mode so repeated runs over the same input
/// keep their history. On failure nothing is installed and the caller can fall
/// back to [`init_logging_stderr`].
pub fn init_logging(input: &Path) -> Result<PathBuf> {
    let path = log_file_path(input);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| Error::PathIo {
            action: "create log directory",
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| Error::PathIo {
            action: "open log file",
            path: path.clone(),
            source,
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr.and(Mutex::new(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::config("logging", e.to_string()))?;

    tracing::info!(path = %path.display(), "Logging initialized");
    Ok(path)
}

/// Initialize logging to stderr only. Used when [`init_logging`] fails so the run can go on.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
