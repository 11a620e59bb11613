//! Building adapter suites from configuration and from detected capabilities.

use async_trait::async_trait;
use bridge_traits::http::FetchOptions;
use bridge_traits::error::PlatformErrorCode;
use bridge_traits::platform::{Notification, ShareRequest};
use bridge_traits::playback::{PlayOptions, PlaybackState};
use bridge_traits::storage::StorageAdapterExt;
use bridge_traits::time::ManualClock;
use core_playback::MockMediaElementFactory;
use core_runtime::config::{
    AudioConfig, AudioOptions, NetworkConfig, NetworkOptions, PlatformConfig, StorageConfig,
    StorageDefaults,
};
use core_runtime::detector::{Capability, EnvironmentProbe};
use core_runtime::{
    AdapterConfig, AdapterDefaults, AdapterFactory, CapabilityDetector, Error, HostBridges,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct FixedProbe {
    os: &'static str,
    vars: Vec<(&'static str, &'static str)>,
    writable: bool,
}

#[async_trait]
impl EnvironmentProbe for FixedProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        self.vars
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    fn os(&self) -> String {
        self.os.to_string()
    }

    async fn data_dir_writable(&self, _dir: &Path) -> bool {
        self.writable
    }

    async fn key_value_file_usable(&self, _path: &Path) -> bool {
        self.writable
    }

    async fn sqlite_available(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_default_config_builds_memory_suite() {
    let factory = AdapterFactory::new(HostBridges::default());
    let suite = factory.create_suite(AdapterConfig::default()).unwrap();

    assert_eq!(suite.storage.backend_name(), "memory");
    assert_eq!(suite.network.adapter_name(), "fetch-based");
    assert_eq!(suite.audio.adapter_name(), "mock");
    assert_eq!(suite.platform.adapter_name(), "native");

    suite.storage.set("a", json!(1)).await.unwrap();
    assert_eq!(suite.storage.get("a").await.unwrap(), Some(json!(1)));
    suite.storage.delete("a").await.unwrap();
    assert_eq!(suite.storage.get("a").await.unwrap(), None);
}

#[tokio::test]
async fn test_durable_suite_from_json_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = AdapterConfig::from_json_str(
        r#"{
            "storage": { "type": "hybrid", "prefix": "reader" },
            "network": { "type": "mock" },
            "platform": { "type": "mock" }
        }"#,
    )
    .unwrap();
    let factory = AdapterFactory::new(HostBridges::default().with_data_dir(dir.path()));

    let suite = factory.create_suite(config.clone()).unwrap();
    assert_eq!(suite.storage.backend_name(), "hybrid");
    suite.storage.set("theme", json!("sepia")).await.unwrap();
    suite
        .storage
        .set_structured("bookmarks", "JHN.3", json!({ "note": "born again" }))
        .await
        .unwrap();
    suite.dispose().await.unwrap();

    assert!(dir.path().join("local-storage.json").exists());
    assert!(dir.path().join("scripture.sqlite3").exists());

    let reopened = factory.create_suite(config).unwrap();
    assert_eq!(
        reopened.storage.get("theme").await.unwrap(),
        Some(json!("sepia"))
    );
    assert_eq!(
        reopened.storage.list_structured("bookmarks").await.unwrap(),
        vec!["JHN.3".to_string()]
    );
    reopened.dispose().await.unwrap();
}

#[tokio::test]
async fn test_storage_defaults_apply() {
    let dir = TempDir::new().unwrap();
    let factory = AdapterFactory::new(HostBridges::default().with_data_dir(dir.path()))
        .with_defaults(AdapterDefaults::default().with_storage(StorageDefaults {
            db_name: "bible".to_string(),
            ..StorageDefaults::default()
        }));

    let storage = factory
        .create_storage(&StorageConfig::Document(Default::default()))
        .unwrap();
    storage.set("k", json!(true)).await.unwrap();
    storage.dispose().await.unwrap();

    assert!(dir.path().join("bible.sqlite3").exists());
}

#[tokio::test]
async fn test_mock_network_uses_merged_settings() {
    let clock = Arc::new(ManualClock::at_millis(0));
    let factory = AdapterFactory::new(HostBridges::default().with_clock(clock.clone()));
    let network = factory
        .create_network(&NetworkConfig::Mock(NetworkOptions {
            base_url: Some("https://api.test".to_string()),
            ..Default::default()
        }))
        .unwrap();

    network
        .set_cached("/verses/JHN.3.16", json!({ "text": "For God so loved" }), None)
        .await;
    let cached = network
        .get_cached("https://api.test/verses/JHN.3.16", None)
        .await;
    assert!(cached.is_some(), "cache keyed by resolved URL");

    clock.advance(Duration::from_secs(301));
    assert!(network
        .get_json("/verses/JHN.3.16", FetchOptions::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_capability_errors_are_actionable() {
    let factory = AdapterFactory::new(HostBridges::default());

    let err = factory
        .create_suite(AdapterConfig::default().with_storage(StorageConfig::SyncBacked(
            Default::default(),
        )))
        .err()
        .unwrap();
    match err {
        Error::CapabilityMissing { capability, message } => {
            assert_eq!(capability, "DataDirectory");
            assert!(message.contains("with_data_dir"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = factory
        .create_suite(
            AdapterConfig::default().with_audio(AudioConfig::NativeElement(AudioOptions::default())),
        )
        .err()
        .unwrap();
    assert!(err.to_string().contains("MediaElementFactory"));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_construction() {
    let dir = TempDir::new().unwrap();
    let factory = AdapterFactory::new(HostBridges::default().with_data_dir(dir.path()));
    let config = AdapterConfig::default().with_audio(AudioConfig::Mock(AudioOptions {
        default_volume: Some(3.0),
        ..Default::default()
    }));

    assert!(matches!(
        factory.create_suite(config),
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_dispose_stops_audio() {
    let media = Arc::new(MockMediaElementFactory::new());
    let factory = AdapterFactory::new(HostBridges::default().with_media_factory(media.clone()));
    let suite = factory
        .create_suite(
            AdapterConfig::default()
                .with_audio(AudioConfig::NativeElement(AudioOptions {
                    default_volume: Some(0.6),
                    ..Default::default()
                }))
                .with_platform(PlatformConfig::Mock),
        )
        .unwrap();
    assert_eq!(suite.audio.adapter_name(), "native-element");

    let handle = suite
        .audio
        .play("https://audio.test/JHN/3.mp3", PlayOptions::default())
        .await
        .unwrap();
    assert_eq!(suite.audio.state(handle), Some(PlaybackState::Playing));
    assert_eq!(media.last_element().unwrap().volume(), 0.6);

    suite.dispose().await.unwrap();
    assert!(suite.audio.active_handles().is_empty());
    assert!(media.last_element().unwrap().is_released());
}

#[tokio::test]
async fn test_recommended_suite_for_interactive_host() {
    let dir = TempDir::new().unwrap();
    let media = Arc::new(MockMediaElementFactory::new());
    let factory = AdapterFactory::new(
        HostBridges::default()
            .with_data_dir(dir.path())
            .with_media_factory(media),
    );
    let detector = CapabilityDetector::new(Arc::new(FixedProbe {
        os: "linux",
        vars: vec![("DISPLAY", ":0")],
        writable: true,
    }))
    .with_data_dir(dir.path())
    .with_audio(true);

    let suite = factory.create_recommended(&detector).await.unwrap();
    assert_eq!(suite.config.storage.kind(), "hybrid");
    assert_eq!(suite.storage.backend_name(), "hybrid");
    assert_eq!(suite.network.adapter_name(), "fetch-based");
    assert_eq!(suite.audio.adapter_name(), "native-element");
    assert_eq!(suite.platform.adapter_name(), "native");
    suite.dispose().await.unwrap();
}

#[tokio::test]
async fn test_detected_ui_capabilities_match_built_platform() {
    let dir = TempDir::new().unwrap();
    let factory = AdapterFactory::new(HostBridges::default().with_data_dir(dir.path()));
    let detector = factory.detector_with_probe(Arc::new(FixedProbe {
        os: "macos",
        vars: vec![],
        writable: true,
    }));

    let report = detector.detect().await;
    let suite = factory.create_recommended(&detector).await.unwrap();
    assert_eq!(suite.platform.adapter_name(), "native");

    let notify = suite
        .platform
        .notify(Notification::new("Verse of the day", "Psalm 23:1"))
        .await;
    assert_eq!(report.has(Capability::SystemNotifications), notify.is_ok());
    if let Err(err) = notify {
        assert_eq!(err.code(), PlatformErrorCode::NotSupported);
    }

    let clipboard = suite.platform.write_clipboard("John 3:16").await;
    assert_eq!(report.has(Capability::Clipboard), clipboard.is_ok());

    let share = suite.platform.share(ShareRequest::default()).await;
    assert_eq!(report.has(Capability::Share), share.is_ok());

    suite.dispose().await.unwrap();
}

#[tokio::test]
async fn test_recommended_suite_for_automation() {
    let factory = AdapterFactory::new(HostBridges::default());
    let detector = CapabilityDetector::new(Arc::new(FixedProbe {
        os: "linux",
        vars: vec![("CI", "true")],
        writable: false,
    }))
    .with_audio(true);

    let suite = factory.create_recommended(&detector).await.unwrap();
    assert_eq!(suite.storage.backend_name(), "memory");
    assert_eq!(suite.audio.adapter_name(), "mock");
    assert_eq!(suite.platform.adapter_name(), "mock");

    suite
        .storage
        .set_typed("settings", &json!({ "fontSize": 18 }))
        .await
        .unwrap();
}
