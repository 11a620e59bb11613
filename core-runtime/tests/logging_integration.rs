//! Integration tests for the logging bootstrap.
//!
//! Installs the global subscriber, so everything lives in one test.

use async_trait::async_trait;
use bridge_desktop::MemoryStorage;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::storage::StorageAdapter;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CapturingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl CapturingSink {
    fn find(&self, message: &str) -> Option<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.message == message)
            .cloned()
    }

    /// Entries arrive on the forwarding thread.
    fn wait_for(&self, message: &str) -> Option<LogEntry> {
        for _ in 0..200 {
            if let Some(entry) = self.find(message) {
                return Some(entry);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }
}

#[async_trait]
impl LoggerSink for CapturingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_global_subscriber_forwards_workspace_events() {
    let sink = Arc::new(CapturingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());
    init_logging(config).unwrap();

    // Emitted from inside another executor.
    let storage = MemoryStorage::new();
    futures::executor::block_on(storage.set("lastRead", serde_json::json!("JHN.3.16"))).unwrap();

    let entry = sink.wait_for("memory set").expect("storage event forwarded");
    assert!(entry.target.starts_with("bridge_desktop"));
    assert_eq!(entry.level, LogLevel::Debug);
    assert_eq!(entry.fields.get("key"), Some(&"lastRead".to_string()));

    tracing::info!(target: "core_runtime", authorization = "Bearer abc", "header configured");
    let entry = sink
        .wait_for("header configured")
        .expect("runtime event forwarded");
    assert_eq!(
        entry.fields.get("authorization"),
        Some(&"[REDACTED]".to_string())
    );

    // Dependencies are held at warn by the default filter. Entries arrive in
    // order, so once the marker is in the quiet event would be too.
    tracing::info!(target: "sqlx::query", "select 1");
    tracing::info!(target: "core_runtime", "after quiet event");
    assert!(sink.wait_for("after quiet event").is_some());
    assert!(sink.find("select 1").is_none());

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));
}
