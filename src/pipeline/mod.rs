//! Three-stage download pipeline split into focused submodules.
//!
//! - [`source`] - reads URL rows from the input file into the URL queue
//! - [`download`] - bounded pool of concurrent downloads feeding the result queue
//! - [`persist`] - single writer draining the result queue to disk
//!
//! [`Pipeline`] wires the stages together with bounded queues of capacity K
//! and one shared [`ShutdownContext`].

pub mod download;
pub mod persist;
pub mod source;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::metrics::Metrics;
use crate::shutdown::ShutdownContext;
use crate::types::{DownloadResult, PipelineOutcome, PipelineReport};

pub use download::{DownloadCoordinator, DownloadStats};
pub use persist::{PersistStats, Persister};
pub use source::{SourceReader, SourceStats};

/// Reads, downloads and persists a list of URLs (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pipeline {
    /// Validated configuration
    config: Arc<Config>,
    /// Fetcher shared by every download task
    fetcher: Arc<dyn Fetcher>,
}

impl Pipeline {
    /// Create a pipeline that downloads over HTTP with `reqwest`
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a pipeline with a custom [`Fetcher`]
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
        })
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline over `input` with a deadline of `shutdown_deadline` from now
    pub async fn run(&self, input: &Path) -> Result<PipelineReport> {
        let shutdown = ShutdownContext::with_timeout(self.config.shutdown_deadline);
        self.run_with_shutdown(input, shutdown).await
    }

    /// Run the pipeline over `input`, stopping when `shutdown` fires
    ///
    /// Fails only if the input cannot be opened or a stage task panics. Every
    /// per-URL problem is logged and reflected in the returned summary instead.
    ///
    /// Stage order:
    /// 1. Open the input (fatal on failure)
    /// 2. Start the reader and the download coordinator
    /// 3. Start a closer that drops the last result queue sender once the
    ///    coordinator has joined all of its tasks
    /// 4. Run the persister until the result queue closes or shutdown fires
    /// 5. Wait for the remaining stages and emit the summary
    pub async fn run_with_shutdown(
        &self,
        input: &Path,
        shutdown: ShutdownContext,
    ) -> Result<PipelineReport> {
        let metrics = Arc::new(Metrics::new());
        let source = SourceReader::open(input).await?;
        let output_dir = self.config.output_dir_for(input);
        let queue_capacity = self.config.max_workers;

        tracing::info!(
            input = %input.display(),
            output_dir = %output_dir.display(),
            max_workers = self.config.max_workers,
            deadline = ?self.config.shutdown_deadline,
            "Starting download pipeline"
        );

        let (url_tx, url_rx) = mpsc::channel::<String>(queue_capacity);
        let (result_tx, result_rx) = mpsc::channel::<DownloadResult>(queue_capacity);

        // Stage 1: read input
        let source_handle = {
            let metrics = Arc::clone(&metrics);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tracing::info!("Stage 1 started: reading input");
                let stats = source.run(url_tx, &metrics, &shutdown).await;
                tracing::info!(records = stats.records, skipped = stats.skipped, "Stage 1 completed");
                stats
            })
        };

        // Stage 2: download
        let coordinator = DownloadCoordinator::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&metrics),
            shutdown.clone(),
            self.config.max_workers,
        );
        let download_handle = {
            let results = result_tx.clone();
            tokio::spawn(async move {
                tracing::info!("Stage 2 started: downloading URLs");
                let stats = coordinator.run(url_rx, results).await;
                tracing::info!(dispatched = stats.dispatched, "Stage 2 completed");
                stats
            })
        };

        // Close the result queue only after every download task has finished
        let closer_handle = tokio::spawn(async move {
            let joined = download_handle.await;
            drop(result_tx);
            tracing::debug!("Result queue closed");
            joined
        });

        // Stage 3: persist
        let persister = Persister::new(
            output_dir.clone(),
            self.config.file_extension.clone(),
            shutdown.clone(),
        );
        let persist_handle = tokio::spawn(async move {
            tracing::info!("Stage 3 started: persisting content");
            let stats = persister.run(result_rx).await;
            tracing::info!(written = stats.written, failed = stats.failed, "Stage 3 completed");
            stats
        });

        let persist_stats = join_stage("persist", persist_handle).await?;
        let download_joined = closer_handle.await.map_err(|e| stage_failed("download", &e))?;
        let download_stats = download_joined.map_err(|e| stage_failed("download", &e))?;
        let source_stats = join_stage("source", source_handle).await?;
        tracing::debug!(
            records = source_stats.records,
            skipped_rows = source_stats.skipped,
            dispatched = download_stats.dispatched,
            abandoned = download_stats.abandoned,
            "All stages joined"
        );

        metrics.mark_finished();
        let summary = metrics.log_summary();

        let outcome = PipelineOutcome::from(shutdown.reason());
        match outcome {
            PipelineOutcome::Completed => tracing::info!("All tasks completed. Exiting..."),
            PipelineOutcome::DeadlineReached => {
                tracing::info!("Shutdown deadline reached. Exiting...")
            }
            PipelineOutcome::Cancelled => tracing::info!("Shutdown requested. Exiting..."),
        }

        Ok(PipelineReport {
            summary,
            outcome,
            files_written: persist_stats.written,
            write_failures: persist_stats.failed,
            output_dir,
        })
    }
}

async fn join_stage<T>(stage: &'static str, handle: tokio::task::JoinHandle<T>) -> Result<T> {
    handle.await.map_err(|e| stage_failed(stage, &e))
}

fn stage_failed(stage: &'static str, e: &tokio::task::JoinError) -> Error {
    tracing::error!(stage, error = %e, "Pipeline stage did not complete");
    Error::StageFailed {
        stage,
        reason: e.to_string(),
    }
}
