//! Detect capabilities, build the recommended adapter suite and use it.
//!
//! Run with:
//! ```bash
//! # Data lands in a temporary directory by default
//! cargo run --example adapter_suite
//!
//! # JSON logs and an explicit data directory
//! cargo run --example adapter_suite -- json /tmp/scripture-demo
//! ```

use bridge_traits::storage::StorageAdapterExt;
use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::{AdapterFactory, HostBridges};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct Highlight {
    verse: String,
    color: String,
}

#[tokio::main]
async fn main() -> core_runtime::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };
    let data_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("scripture-demo"));

    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let factory = AdapterFactory::new(HostBridges::default().with_data_dir(&data_dir));
    let detector = factory.detector();
    let report = detector.detect().await;
    info!(environment = ?report.environment, "Environment classified");

    let suite = factory.create_recommended(&detector).await?;
    info!(storage = suite.config.storage.kind(), "Using storage");

    suite
        .storage
        .set_typed("preferences", &serde_json::json!({ "fontSize": 18 }))
        .await?;
    let highlight = Highlight {
        verse: "PSA.23.1".to_string(),
        color: "yellow".to_string(),
    };
    let value = serde_json::to_value(&highlight)
        .map_err(|e| core_runtime::Error::Internal(e.to_string()))?;
    suite
        .storage
        .set_structured("highlights", &highlight.verse, value)
        .await?;

    let ids = suite.storage.list_structured("highlights").await?;
    info!(count = ids.len(), "Highlights stored");

    let online = suite.network.is_online().await;
    info!(online, "Network status");

    suite.dispose().await
}
