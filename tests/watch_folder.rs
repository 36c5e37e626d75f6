//! End-to-end runs of the watch folder: real filesystem notifications,
//! in-process processing API

mod common;

use bgremove_watch::{run_watch_folder, DirectoryLayout, WatchConfig};
use common::{test_config, wait_until, MockApi};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const STARTUP_GRACE: Duration = Duration::from_millis(300);
const TIMEOUT: Duration = Duration::from_secs(10);

/// Run the watch folder alongside `scenario`; the scenario decides when to stop
async fn with_watch_folder<F: Future<Output = ()>>(config: WatchConfig, scenario: F) {
    tokio::select! {
        result = run_watch_folder(Arc::new(config)) => {
            panic!("watch folder stopped unexpectedly: {result:?}");
        },
        () = async {
            tokio::time::sleep(STARTUP_GRACE).await;
            scenario.await;
        } => {},
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_created_file_is_processed_and_archived() {
    let api = MockApi::start(200, b"RESULT").await;
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config(&api.url, temp_dir.path());

    with_watch_folder(config, async {
        std::fs::write(layout.source.join("cat.png"), b"0123456789").unwrap();

        let done = wait_until(
            || {
                layout.processed.join("cat.png").exists()
                    && layout.destination.join("cat.png").exists()
            },
            TIMEOUT,
        )
        .await;
        assert!(done, "file was not processed in time");
    })
    .await;

    assert_eq!(std::fs::read(layout.processed.join("cat.png")).unwrap(), b"RESULT");
    assert_eq!(
        std::fs::read(layout.destination.join("cat.png")).unwrap(),
        b"0123456789"
    );
    assert!(!layout.source.join("cat.png").exists());
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_moved_into_source_is_processed() {
    let api = MockApi::start(200, b"RESULT").await;
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config(&api.url, temp_dir.path());

    // Written completely outside the watched directory, then moved in
    let staging = temp_dir.path().join("staging.png");
    std::fs::write(&staging, b"0123456789").unwrap();

    with_watch_folder(config, async {
        std::fs::rename(&staging, layout.source.join("cat.png")).unwrap();

        let done = wait_until(|| layout.destination.join("cat.png").exists(), TIMEOUT).await;
        assert!(done, "file moved into source was not processed in time");
    })
    .await;

    assert_eq!(std::fs::read(layout.processed.join("cat.png")).unwrap(), b"RESULT");
    assert!(!layout.source.join("cat.png").exists());
    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].file_parts()[0].data, b"0123456789");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_api_failure_leaves_original_in_source() {
    let api = MockApi::start(500, b"bad image").await;
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config(&api.url, temp_dir.path());

    with_watch_folder(config, async {
        std::fs::write(layout.source.join("cat.png"), b"0123456789").unwrap();

        assert!(
            wait_until(|| !api.requests().is_empty(), TIMEOUT).await,
            "upload never reached the API"
        );
        // Give the loop time to (not) write or move anything
        tokio::time::sleep(Duration::from_millis(300)).await;
    })
    .await;

    assert!(layout.source.join("cat.png").exists());
    assert!(!layout.processed.join("cat.png").exists());
    assert!(!layout.destination.join("cat.png").exists());
    assert_eq!(api.requests().len(), 1, "failures are not retried");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directories_are_ignored_and_loop_keeps_running() {
    let api = MockApi::start(200, b"RESULT").await;
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config(&api.url, temp_dir.path());

    with_watch_folder(config, async {
        std::fs::create_dir(layout.source.join("nested")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(layout.source.join("dog.png"), b"dog").unwrap();

        assert!(
            wait_until(|| layout.destination.join("dog.png").exists(), TIMEOUT).await,
            "file after the directory was not processed"
        );
    })
    .await;

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].file_parts()[0].file_name.as_deref(), Some("dog.png"));
    assert!(layout.source.join("nested").is_dir());
    assert!(!layout.processed.join("nested").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_files_are_processed_one_after_another() {
    let api = MockApi::start(200, b"RESULT").await;
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config(&api.url, temp_dir.path());
    let names = ["a.png", "b.png", "c.png"];

    with_watch_folder(config, async {
        for name in names {
            std::fs::write(layout.source.join(name), name.as_bytes()).unwrap();
        }
        let all_archived = wait_until(
            || names.iter().all(|name| layout.destination.join(name).exists()),
            TIMEOUT,
        )
        .await;
        assert!(all_archived, "not every file was archived");
    })
    .await;

    assert_eq!(api.requests().len(), names.len());
    for name in names {
        assert_eq!(std::fs::read(layout.processed.join(name)).unwrap(), b"RESULT");
        assert!(!layout.source.join(name).exists());
    }
}

#[test]
fn test_missing_endpoint_stops_before_bootstrap() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "api_key: key\ndirectories:\n  source: {}\n  destination: {}\n  processed: {}\n",
            layout.source.display(),
            layout.destination.display(),
            layout.processed.display()
        ),
    )
    .unwrap();

    let err = WatchConfig::from_file(&config_path).unwrap_err();

    assert!(err.to_string().contains("api_url"));
    for dir in layout.all() {
        assert!(!dir.exists(), "{} must not be created", dir.display());
    }
}

#[tokio::test]
async fn test_bootstrap_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DirectoryLayout::under(temp_dir.path());
    let config = test_config("http://127.0.0.1:9/edit", temp_dir.path());

    // A file where the source directory should be: bootstrap fails
    std::fs::write(&layout.source, b"in the way").unwrap();

    let result = run_watch_folder(Arc::new(config)).await;
    assert!(result.is_err());
}
