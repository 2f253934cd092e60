use super::*;
use crate::pipeline::test_helpers::write_input;
use std::time::Duration;

/// Run the reader over `path` with a roomy queue and collect what it sent.
async fn read_all(path: &Path) -> (Vec<String>, SourceStats, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let shutdown = ShutdownContext::without_deadline();
    let (tx, mut rx) = mpsc::channel(64);

    let reader = SourceReader::open(path).await.unwrap();
    let stats = reader.run(tx, &metrics, &shutdown).await;

    let mut urls = Vec::new();
    while let Some(url) = rx.recv().await {
        urls.push(url);
    }
    (urls, stats, metrics)
}

#[tokio::test]
async fn reads_urls_after_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(dir.path(), "valid.csv", &["https://example.com", "google.com"]);

    let (urls, stats, metrics) = read_all(&path).await;

    assert_eq!(urls, vec!["https://example.com", "google.com"]);
    assert_eq!(stats.records, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(metrics.total(), 2);
}

#[tokio::test]
async fn empty_file_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, "").unwrap();

    let (urls, stats, metrics) = read_all(&path).await;

    assert!(urls.is_empty());
    assert_eq!(stats, SourceStats::default());
    assert_eq!(metrics.total(), 0);
}

#[tokio::test]
async fn header_only_file_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(dir.path(), "header.csv", &[]);

    let (urls, _stats, metrics) = read_all(&path).await;

    assert!(urls.is_empty());
    assert_eq!(metrics.total(), 0);
}

#[tokio::test]
async fn rows_with_extra_fields_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(
        dir.path(),
        "mixed.csv",
        &["https://example.com", "https://a.com,https://b.com"],
    );

    let (urls, stats, metrics) = read_all(&path).await;

    assert_eq!(urls, vec!["https://example.com"]);
    assert_eq!(stats.skipped, 1);
    assert_eq!(metrics.total(), 1, "malformed rows must not be counted");
}

#[tokio::test]
async fn unparseable_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(
        dir.path(),
        "quotes.csv",
        &[r#"bad"quote.com"#, r#""unterminated.com"#, "good.com"],
    );

    let (urls, stats, _metrics) = read_all(&path).await;

    assert_eq!(urls, vec!["good.com"]);
    assert_eq!(stats.skipped, 2);
}

#[tokio::test]
async fn malformed_header_stops_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("badheader.csv");
    std::fs::write(&path, "url,extra\nhttps://example.com\n").unwrap();

    let (urls, _stats, metrics) = read_all(&path).await;

    assert!(urls.is_empty());
    assert_eq!(metrics.total(), 0);
}

#[tokio::test]
async fn crlf_blank_lines_and_quoted_urls_are_handled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("windows.csv");
    std::fs::write(
        &path,
        "\r\nurl\r\nhttps://example.com\r\n\r\n\"https://example.com/?q=a,b\"\r\n  spaced.com  \r\n",
    )
    .unwrap();

    let (urls, stats, _metrics) = read_all(&path).await;

    assert_eq!(
        urls,
        vec![
            "https://example.com",
            "https://example.com/?q=a,b",
            "spaced.com"
        ]
    );
    assert_eq!(stats.skipped, 0);
}

#[tokio::test]
async fn invalid_utf8_row_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binary.csv");
    let mut content = b"url\n".to_vec();
    content.extend_from_slice(&[0xff, 0xfe, b'\n']);
    content.extend_from_slice(b"ok.com\n");
    std::fs::write(&path, content).unwrap();

    let (urls, stats, _metrics) = read_all(&path).await;

    assert_eq!(urls, vec!["ok.com"]);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = SourceReader::open(&dir.path().join("non_existent_file.csv")).await;
    assert!(matches!(result, Err(Error::PathIo { .. })));
}

#[tokio::test]
async fn cancelled_before_start_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(dir.path(), "valid.csv", &["https://example.com", "google.com"]);

    let metrics = Metrics::new();
    let shutdown = ShutdownContext::without_deadline();
    shutdown.cancel();
    let (tx, mut rx) = mpsc::channel(8);

    let stats = SourceReader::open(&path)
        .await
        .unwrap()
        .run(tx, &metrics, &shutdown)
        .await;

    assert_eq!(stats.records, 0);
    assert_eq!(metrics.total(), 0);
    assert!(rx.recv().await.is_none(), "queue must be closed and empty");
}

#[tokio::test]
async fn full_queue_blocks_reader_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_input(dir.path(), "many.csv", &["a.com", "b.com", "c.com"]);

    let metrics = Arc::new(Metrics::new());
    let shutdown = ShutdownContext::without_deadline();
    let (tx, mut rx) = mpsc::channel(1);

    let reader = SourceReader::open(&path).await.unwrap();
    let handle = {
        let metrics = Arc::clone(&metrics);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { reader.run(tx, &metrics, &shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "reader should be blocked on the full queue");

    shutdown.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reader should stop after cancellation")
        .unwrap();

    // First URL fits in the queue, the second was counted but never enqueued
    assert_eq!(stats.records, 2);
    assert_eq!(metrics.total(), 2);
    assert_eq!(rx.recv().await.as_deref(), Some("a.com"));
    assert!(rx.recv().await.is_none());
}
