//! Utility functions for URL normalization, input validation and output naming

use crate::error::{Error, Result};
use rand::Rng;
use std::path::{Path, PathBuf};

/// Extension (case-insensitive) an input file must carry
pub const INPUT_EXTENSION: &str = "csv";

/// Prefix `https://` to a URL that carries no `http://` or `https://` scheme
///
/// The scheme is matched case-insensitively, so `HTTP://host` is left alone.
///
/// # Examples
///
/// ```
/// use url_downloader::utils::ensure_scheme;
///
/// assert_eq!(ensure_scheme("example.com"), "https://example.com");
/// assert_eq!(ensure_scheme("http://example.com"), "http://example.com");
/// assert_eq!(ensure_scheme("HTTPS://example.com"), "HTTPS://example.com");
/// ```
pub fn ensure_scheme(url: &str) -> String {
    if has_prefix_ignore_case(url, "http://") || has_prefix_ignore_case(url, "https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Working directory derived from an input file: its path with the extension removed
///
/// `/data/urls.csv` becomes `/data/urls`. The log file and the default output
/// directory both live underneath it.
pub fn input_work_dir(input: &Path) -> PathBuf {
    input.with_extension("")
}

/// Input file name without directory or extension (`/data/urls.csv` -> `urls`)
pub fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("url-downloader")
        .to_string()
}

/// Validate the input path before the pipeline is started
///
/// The path must exist, be a regular file, and end in `.csv`.
pub fn validate_input_path(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|_| Error::InvalidInput {
        path: path.to_path_buf(),
        reason: "csv filepath is not found".to_string(),
    })?;

    if !metadata.is_file() {
        return Err(Error::InvalidInput {
            path: path.to_path_buf(),
            reason: "csv filepath is not a regular file".to_string(),
        });
    }

    let has_csv_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(INPUT_EXTENSION));
    if !has_csv_extension {
        return Err(Error::InvalidInput {
            path: path.to_path_buf(),
            reason: "invalid extension, expected .csv".to_string(),
        });
    }

    Ok(())
}

/// Generate a file name of the form `<salt>-<unix nanos>.<extension>`
///
/// The salt is drawn from `0..1_000_000`. Callers that need a guarantee create the
/// file with create-new semantics and call again on collision.
pub fn unique_file_name(extension: &str) -> String {
    let salt: u32 = rand::thread_rng().gen_range(0..1_000_000);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{salt}-{nanos}.{extension}")
}
