use super::*;
use crate::pipeline::test_helpers::list_files;
use std::collections::HashSet;

async fn persist_all(persister: Persister, results: Vec<DownloadResult>) -> PersistStats {
    let (tx, rx) = mpsc::channel(results.len().max(1));
    for result in results {
        tx.send(result).await.unwrap();
    }
    drop(tx);
    persister.run(rx).await
}

#[tokio::test]
async fn writes_each_result_to_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("nested").join("downloads");
    let persister = Persister::new(output_dir.clone(), "txt", ShutdownContext::without_deadline());

    let stats = persist_all(
        persister,
        vec![DownloadResult::new(
            "https://example.com".to_string(),
            b"test content".to_vec(),
        )],
    )
    .await;

    assert_eq!(stats, PersistStats { written: 1, failed: 0 });
    let files = list_files(&output_dir);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().unwrap(), "txt");
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"test content");
}

#[tokio::test]
async fn closed_empty_queue_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("downloads");
    let persister = Persister::new(output_dir.clone(), "txt", ShutdownContext::without_deadline());

    let stats = persist_all(persister, Vec::new()).await;

    assert_eq!(stats, PersistStats::default());
    assert!(list_files(&output_dir).is_empty());
}

#[tokio::test]
async fn queued_results_are_dropped_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("downloads");
    let shutdown = ShutdownContext::without_deadline();
    shutdown.cancel();
    let persister = Persister::new(output_dir.clone(), "txt", shutdown);

    let stats = persist_all(
        persister,
        vec![DownloadResult::new("a.com".to_string(), b"a".to_vec())],
    )
    .await;

    assert_eq!(stats.written, 0);
    assert!(list_files(&output_dir).is_empty());
}

#[tokio::test]
async fn write_failures_are_counted_and_do_not_stop_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the output directory should be
    let blocker = dir.path().join("downloads");
    std::fs::write(&blocker, "not a directory").unwrap();
    let persister = Persister::new(blocker.clone(), "txt", ShutdownContext::without_deadline());

    let stats = persist_all(
        persister,
        vec![
            DownloadResult::new("a.com".to_string(), b"a".to_vec()),
            DownloadResult::new("b.com".to_string(), b"b".to_vec()),
        ],
    )
    .await;

    assert_eq!(stats, PersistStats { written: 0, failed: 2 });
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
}

#[tokio::test]
async fn many_results_get_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("downloads");
    let persister = Persister::new(output_dir.clone(), "html", ShutdownContext::without_deadline());

    let results = (0..50)
        .map(|i| DownloadResult::new(format!("https://host{i}.example"), format!("body {i}").into_bytes()))
        .collect();
    let stats = persist_all(persister, results).await;

    assert_eq!(stats.written, 50);
    let files = list_files(&output_dir);
    assert_eq!(files.len(), 50);

    let bodies: HashSet<String> = files
        .iter()
        .map(|f| std::fs::read_to_string(f).unwrap())
        .collect();
    assert_eq!(bodies.len(), 50, "every result must land in its own file");
    assert!(files.iter().all(|f| f.extension().unwrap() == "html"));
}

#[tokio::test]
async fn empty_body_still_produces_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let persister = Persister::new(dir.path().to_path_buf(), "txt", ShutdownContext::without_deadline());

    let path = persister
        .persist(&DownloadResult::new("empty.example".to_string(), Vec::new()))
        .await
        .unwrap();

    assert!(path.starts_with(persister.output_dir()));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}
