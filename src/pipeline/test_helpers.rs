//! Shared test helpers: an in-memory fetcher and input file builders.

use crate::error::FetchError;
use crate::fetch::Fetcher;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned reply for one URL
#[derive(Clone, Debug)]
pub(crate) enum MockReply {
    Body(Vec<u8>),
    Status(u16),
}

/// [`Fetcher`] that answers from a table and tracks how many calls overlap.
///
/// URLs without an entry get a 200 whose body is the URL itself.
pub(crate) struct MockFetcher {
    replies: HashMap<String, MockReply>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

/// Decrements the in-flight counter even when the fetch future is dropped mid-sleep
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            replies: HashMap::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(mut self, url: &str, reply: MockReply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    /// Highest number of fetches that were running at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches currently running
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// URLs passed to `fetch`, in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.replies.get(url) {
            Some(MockReply::Body(body)) => Ok(body.clone()),
            Some(MockReply::Status(status)) => Err(FetchError::Status { status: *status }),
            None => Ok(url.as_bytes().to_vec()),
        }
    }
}

/// Write `<dir>/<name>` containing a `url` header followed by `rows`
pub(crate) fn write_input(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut content = String::from("url\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Every file directly inside `dir` (empty if `dir` does not exist)
pub(crate) fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
