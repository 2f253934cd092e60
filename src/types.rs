//! Core types passed between pipeline stages and returned to callers

use crate::metrics::MetricsSummary;
use crate::shutdown::ShutdownReason;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Payload of one successful download, moved from a download task to the persister
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    url: String,
    content: Vec<u8>,
}

impl DownloadResult {
    /// Pair a URL (as read from the input) with its downloaded body
    pub fn new(url: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            content,
        }
    }

    /// The URL as it appeared in the input file
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The downloaded body
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Body size in bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the body is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Every stage drained its input before the deadline
    Completed,
    /// The shutdown deadline cut the run short
    DeadlineReached,
    /// The run was cancelled explicitly (e.g. by a termination signal)
    Cancelled,
}

impl From<Option<ShutdownReason>> for PipelineOutcome {
    fn from(reason: Option<ShutdownReason>) -> Self {
        match reason {
            None => PipelineOutcome::Completed,
            Some(ShutdownReason::DeadlineReached) => PipelineOutcome::DeadlineReached,
            Some(ShutdownReason::Cancelled) => PipelineOutcome::Cancelled,
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PipelineOutcome::Completed => "All tasks completed",
            PipelineOutcome::DeadlineReached => "Shutdown deadline reached",
            PipelineOutcome::Cancelled => "Shutdown requested",
        };
        f.write_str(text)
    }
}

/// Everything a caller learns from one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Download counters and timings
    pub summary: MetricsSummary,
    /// Whether the run finished or was cut short
    pub outcome: PipelineOutcome,
    /// Files written by the persister
    pub files_written: u64,
    /// Results the persister failed to write
    pub write_failures: u64,
    /// Directory the files were written to
    pub output_dir: PathBuf,
}
