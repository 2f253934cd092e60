//! Download coordinator: bounded pool of concurrent download tasks.
//!
//! Each URL taken from the queue needs a permit from a semaphore of size K
//! before its task is spawned, so at most K downloads are in flight. Tasks
//! are tracked in a [`JoinSet`] and the coordinator only returns after every
//! one of them has finished.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::metrics::Metrics;
use crate::shutdown::ShutdownContext;
use crate::types::DownloadResult;
use crate::utils::ensure_scheme;

/// Counters reported by [`DownloadCoordinator::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// URLs for which a download task was spawned
    pub dispatched: u64,
    /// URLs taken from the queue but dropped by shutdown before dispatch
    pub abandoned: u64,
}

/// State shared by every download task spawned by one coordinator
struct DownloadTaskContext {
    fetcher: Arc<dyn Fetcher>,
    metrics: Arc<Metrics>,
    shutdown: ShutdownContext,
    results: mpsc::Sender<DownloadResult>,
}

/// Consumes the URL queue and runs downloads with at most `max_workers` in flight
pub struct DownloadCoordinator {
    fetcher: Arc<dyn Fetcher>,
    metrics: Arc<Metrics>,
    shutdown: ShutdownContext,
    max_workers: usize,
}

impl DownloadCoordinator {
    /// Create a coordinator. `max_workers` below 1 is treated as 1.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        metrics: Arc<Metrics>,
        shutdown: ShutdownContext,
        max_workers: usize,
    ) -> Self {
        Self {
            fetcher,
            metrics,
            shutdown,
            max_workers: max_workers.max(1),
        }
    }

    /// Run until the URL queue closes or shutdown fires, then join every task
    ///
    /// `results` is moved into the coordinator and cloned into each task, so
    /// this handle to the result queue is gone once `run` returns.
    pub async fn run(
        self,
        mut urls: mpsc::Receiver<String>,
        results: mpsc::Sender<DownloadResult>,
    ) -> DownloadStats {
        let concurrent_limit = Arc::new(Semaphore::new(self.max_workers));
        let task_ctx = Arc::new(DownloadTaskContext {
            fetcher: Arc::clone(&self.fetcher),
            metrics: Arc::clone(&self.metrics),
            shutdown: self.shutdown.clone(),
            results,
        });
        let mut tasks = JoinSet::new();
        let mut stats = DownloadStats::default();

        loop {
            let url = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::warn!("Stage 2: shutdown initiated, stopping new downloads");
                    break;
                }
                url = urls.recv() => match url {
                    Some(url) => url,
                    None => break,
                },
            };

            // Blocks while K downloads are in flight
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::warn!(url = %url, "Stage 2: shutdown initiated while waiting for a worker slot");
                    stats.abandoned += 1;
                    break;
                }
                permit = Arc::clone(&concurrent_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!("Worker pool closed unexpectedly");
                        stats.abandoned += 1;
                        break;
                    }
                },
            };

            // Reap finished tasks so the set does not grow with the input
            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }

            tasks.spawn(download_one(Arc::clone(&task_ctx), url, permit));
            stats.dispatched += 1;
        }

        // Stop the reader from blocking on a queue nobody will drain
        urls.close();
        drop(task_ctx);

        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }

        tracing::debug!(
            dispatched = stats.dispatched,
            abandoned = stats.abandoned,
            "All download tasks joined"
        );
        stats
    }
}

fn log_join_error(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Download task did not complete");
    }
}

/// Download a single URL and hand the body to the persister
///
/// Records exactly one success or failure. The permit is held until the
/// result has been queued, so a full result queue also holds back new downloads.
async fn download_one(ctx: Arc<DownloadTaskContext>, url: String, _permit: OwnedSemaphorePermit) {
    let target = ensure_scheme(&url);
    let started = Instant::now();

    let fetched = tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => Err(FetchError::Cancelled),
        fetched = ctx.fetcher.fetch(&target) => fetched,
    };

    let body = match fetched {
        Ok(body) => body,
        Err(e) => {
            ctx.metrics.record_failure();
            if e.is_cancelled() {
                tracing::warn!(url = %url, "Download aborted by shutdown");
            } else {
                tracing::error!(url = %url, error = %e, "Error downloading");
            }
            return;
        }
    };

    let elapsed = started.elapsed();
    ctx.metrics.record_success(elapsed);
    tracing::debug!(url = %url, bytes = body.len(), elapsed = ?elapsed, "Downloaded");

    let result = DownloadResult::new(url.clone(), body);
    tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => {
            tracing::info!(url = %url, "Stage 2: shutdown initiated, skipping content persistence");
        }
        sent = ctx.results.send(result) => {
            if sent.is_err() {
                tracing::warn!(url = %url, "Result queue closed, dropping downloaded content");
            }
        }
    }
}
