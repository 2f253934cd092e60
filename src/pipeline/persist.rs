//! Persister: the single consumer of the result queue.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::shutdown::ShutdownContext;
use crate::types::DownloadResult;
use crate::utils::unique_file_name;

/// Maximum number of fresh names tried when a generated file name already exists
const MAX_NAME_ATTEMPTS: u32 = 16;

/// Counters reported by [`Persister::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Results written to disk
    pub written: u64,
    /// Results that could not be written
    pub failed: u64,
}

/// Writes each downloaded result to its own uniquely named file
///
/// Runs as exactly one task, so writes never interleave and name generation
/// never races with itself.
pub struct Persister {
    output_dir: PathBuf,
    extension: String,
    shutdown: ShutdownContext,
}

impl Persister {
    /// Create a persister writing `<output_dir>/<unique name>.<extension>` files
    pub fn new(output_dir: PathBuf, extension: impl Into<String>, shutdown: ShutdownContext) -> Self {
        Self {
            output_dir,
            extension: extension.into(),
            shutdown,
        }
    }

    /// Directory files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Drain `results` until the queue closes or shutdown fires
    ///
    /// A failed write is logged and skipped. On shutdown, results still queued
    /// are discarded; a write already in progress is allowed to finish.
    pub async fn run(self, mut results: mpsc::Receiver<DownloadResult>) -> PersistStats {
        let mut stats = PersistStats::default();

        loop {
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Stage 3: shutdown initiated, stopping file write");
                    break;
                }
                result = results.recv() => match result {
                    Some(result) => result,
                    None => break,
                },
            };

            match self.persist(&result).await {
                Ok(path) => {
                    stats.written += 1;
                    tracing::info!(
                        path = %path.display(),
                        url = %result.url(),
                        bytes = result.len(),
                        "Saved content"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        dir = %self.output_dir.display(),
                        url = %result.url(),
                        error = %e,
                        "Error writing file"
                    );
                }
            }
        }

        stats
    }

    /// Write one result and return the path it was written to
    pub async fn persist(&self, result: &DownloadResult) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.output_dir.join(unique_file_name(&self.extension));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            if let Err(e) = write_and_sync(&mut file, result.content()).await {
                drop(file);
                // Leave no truncated file behind
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove partial file");
                }
                return Err(e);
            }
            return Ok(path);
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no unique file name found after {MAX_NAME_ATTEMPTS} attempts"),
        ))
    }
}

async fn write_and_sync(file: &mut tokio::fs::File, content: &[u8]) -> std::io::Result<()> {
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}
