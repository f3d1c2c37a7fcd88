use rask_log_router::transport::{FileSettings, FileTransport, Transport};
use rask_log_router::{LogArg, Logger, LoggerOptions};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn entries(contents: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(contents)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn test_duplicate_file_transports_get_suffixed_keys() {
    let dir = TempDir::new().unwrap();
    let first = Arc::new(FileTransport::new(FileSettings::new(dir.path().join("a.log"))).unwrap());
    let second = Arc::new(FileTransport::new(FileSettings::new(dir.path().join("b.log"))).unwrap());

    let mut logger = Logger::new(LoggerOptions::default());
    assert_eq!(logger.transports_mut().add(first.clone()), "File");
    assert_eq!(logger.transports_mut().add(second.clone()), "File1");

    let selection = logger.transports().get("File");
    assert_eq!(selection.len(), 2);

    selection.set_property("buffer_size", json!(1)).unwrap();
    assert_eq!(first.settings().buffer_size, 1);
    assert_eq!(second.settings().buffer_size, 1);

    assert!(selection.set_property("buffer_size", json!("big")).is_err());
    assert!(selection.set_property("filename", json!("")).is_err());
    assert_eq!(first.settings().buffer_size, 1);
    assert_eq!(second.settings().filename, dir.path().join("b.log"));
}

#[tokio::test]
async fn test_entries_appended_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let mut settings = FileSettings::new(&path);
    settings.buffer_size = 2;
    let file = Arc::new(FileTransport::new(settings).unwrap());

    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(file.clone());

    for n in 0..5 {
        logger.log("jobs:nightly", format!("step {n}"), [LogArg::property("step", n)]);
    }
    file.shutdown().await;

    let entries = entries(&std::fs::read_to_string(&path).unwrap());
    assert_eq!(entries.len(), 5);
    for (n, entry) in entries.iter().enumerate() {
        assert_eq!(entry["group"], json!("jobs:nightly"));
        assert_eq!(entry["message"], json!(format!("step {n}")));
        assert_eq!(entry["properties"]["step"], json!(n));
        assert!(entry["timestamp"].is_string());
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_flush_writes_without_further_activity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timer.log");
    let file = FileTransport::new(FileSettings::new(&path)).unwrap();

    file.deliver(&Arc::new(rask_log_router::LogRecord::new("db", "slow query")))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    file.shutdown().await;

    let entries = entries(&std::fs::read_to_string(&path).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], json!("slow query"));
}

#[tokio::test]
async fn test_removed_transport_flushes_pending_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("removed.log");
    let file = Arc::new(FileTransport::new(FileSettings::new(&path)).unwrap());

    let mut logger = Logger::new(LoggerOptions::default());
    logger.transports_mut().add(file.clone());
    logger.log("api", "before removal", []);

    assert_eq!(logger.transports_mut().remove("File", None), vec!["File"]);
    assert!(logger.log("api", "after removal", []).is_none());

    file.shutdown().await;
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("before removal"));
    assert!(!contents.contains("after removal"));
}
