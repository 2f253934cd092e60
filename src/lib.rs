//! # url-downloader
//!
//! Concurrent downloader for a list of URLs read from a CSV file.
//!
//! ## How it works
//!
//! A run is a three-stage pipeline connected by bounded queues:
//! - **Reader** - streams one URL per row from the input file, skipping the header
//! - **Downloaders** - fetch up to K URLs at a time over HTTP(S)
//! - **Persister** - writes each body to its own uniquely named file
//!
//! Every stage watches one shared [`ShutdownContext`], which fires when the
//! deadline passes or when cancellation is requested. A run always ends with a
//! [`MetricsSummary`] of how many URLs were read, downloaded and failed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use url_downloader::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         max_workers: 4,
//!         ..Default::default()
//!     };
//!
//!     let pipeline = Pipeline::new(config)?;
//!     let report = pipeline.run(Path::new("urls.csv")).await?;
//!     println!("{}", report.summary);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP fetching behind a trait seam
pub mod fetch;
/// Tracing subscriber setup
pub mod logging;
/// Run counters and the final summary
pub mod metrics;
/// Reader, download and persist stages plus their orchestration
pub mod pipeline;
/// Deadline and cancellation context shared by every stage
pub mod shutdown;
/// Core types passed between stages and returned to callers
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, FetchError, RecordError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use metrics::{Metrics, MetricsSummary};
pub use pipeline::Pipeline;
pub use shutdown::{ShutdownContext, ShutdownReason, ShutdownSignal};
pub use types::{DownloadResult, PipelineOutcome, PipelineReport};
