//! # Capability Detection
//!
//! Classifies the host environment, probes what it can do, and recommends an
//! [`AdapterConfig`] from the result.
//!
//! All host interrogation goes through [`EnvironmentProbe`] so detection is
//! deterministic under test. [`SystemProbe`] is the real implementation.

use async_trait::async_trait;
use bridge_desktop::{DocumentStorage, FileKeyValueStore};
use bridge_traits::network::NetworkMonitor;
use bridge_traits::platform::PlatformFeatures;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{
    AdapterConfig, AudioConfig, AudioOptions, DocumentOptions, HybridOptions, MemoryOptions,
    NetworkConfig, NetworkOptions, PlatformConfig, StorageConfig, SyncBackedOptions,
    DEFAULT_FILE_NAME,
};

/// Environment variables marking an automated run.
pub const AUTOMATION_MARKERS: &[&str] = &["CI", "NEXTEST_RUN_ID", "SCRIPTURE_AUTOMATION"];

/// Environment variable forcing headless classification.
pub const HEADLESS_MARKER: &str = "SCRIPTURE_HEADLESS";

const DISPLAY_VARS: &[&str] = &["DISPLAY", "WAYLAND_DISPLAY"];

const DESKTOP_UI_OS: &[&str] = &["macos", "windows", "ios", "android"];

const UNIX_OS: &[&str] = &[
    "linux",
    "freebsd",
    "openbsd",
    "netbsd",
    "dragonfly",
    "solaris",
    "illumos",
];

const SHARE_OS: &[&str] = &["macos", "ios", "android"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentKind {
    InteractiveUi,
    AutomatedTest,
    Headless,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    DurableSmallStorage,
    DurableDocumentStorage,
    NetworkFetch,
    AudioPlayback,
    SystemNotifications,
    Clipboard,
    Share,
    BackgroundSync,
    NetworkOnline,
}

/// Host interrogation used by [`CapabilityDetector`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    /// Value of an environment variable, if set.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Operating system name in `std::env::consts::OS` form.
    fn os(&self) -> String;

    /// Can files be created in `dir`?
    async fn data_dir_writable(&self, dir: &Path) -> bool;

    /// Can the key-value file at `path` be loaded and rewritten? A missing
    /// file counts as usable.
    async fn key_value_file_usable(&self, path: &Path) -> bool;

    /// Can an SQLite database be opened?
    async fn sqlite_available(&self) -> bool;
}

/// Probe backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[async_trait]
impl EnvironmentProbe for SystemProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    async fn data_dir_writable(&self, dir: &Path) -> bool {
        if tokio::fs::create_dir_all(dir).await.is_err() {
            return false;
        }
        let marker = dir.join(".scripture-write-probe");
        let writable = tokio::fs::write(&marker, b"ok").await.is_ok();
        let _ = tokio::fs::remove_file(&marker).await;
        writable
    }

    async fn key_value_file_usable(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.permissions().readonly() => return false,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(_) => return false,
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || FileKeyValueStore::open(path, None).is_ok())
            .await
            .unwrap_or(false)
    }

    async fn sqlite_available(&self) -> bool {
        DocumentStorage::probe().await
    }
}

/// Outcome of a detection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub environment: EnvironmentKind,
    pub capabilities: BTreeSet<Capability>,
}

impl CapabilityReport {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

fn is_set(value: Option<String>) -> bool {
    match value {
        Some(value) => {
            let value = value.trim();
            !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
        }
        None => false,
    }
}

/// Detects the environment and its capabilities.
pub struct CapabilityDetector {
    probe: Arc<dyn EnvironmentProbe>,
    data_dir: Option<PathBuf>,
    key_value_file: String,
    audio_available: bool,
    platform_features: PlatformFeatures,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl CapabilityDetector {
    pub fn new(probe: Arc<dyn EnvironmentProbe>) -> Self {
        Self {
            probe,
            data_dir: None,
            key_value_file: DEFAULT_FILE_NAME.to_string(),
            audio_available: false,
            platform_features: PlatformFeatures::default(),
            network_monitor: None,
        }
    }

    /// Detector over the real process environment.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemProbe))
    }

    /// Directory durable storage would live in.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// File name the sync-backed store would use inside the data directory.
    pub fn with_key_value_file(mut self, file_name: impl Into<String>) -> Self {
        self.key_value_file = file_name.into();
        self
    }

    /// UI integrations the platform adapter delivers. Notifications,
    /// clipboard and share are only reported when listed here.
    pub fn with_platform_features(mut self, features: PlatformFeatures) -> Self {
        self.platform_features = features;
        self
    }

    /// Whether the host supplied a media-element factory.
    pub fn with_audio(mut self, available: bool) -> Self {
        self.audio_available = available;
        self
    }

    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn environment(&self) -> EnvironmentKind {
        let probe = self.probe.as_ref();

        if AUTOMATION_MARKERS
            .iter()
            .any(|name| is_set(probe.env_var(name)))
        {
            return EnvironmentKind::AutomatedTest;
        }
        if is_set(probe.env_var(HEADLESS_MARKER)) {
            return EnvironmentKind::Headless;
        }

        let os = probe.os();
        if DESKTOP_UI_OS.contains(&os.as_str())
            || DISPLAY_VARS.iter().any(|name| is_set(probe.env_var(name)))
        {
            return EnvironmentKind::InteractiveUi;
        }
        if UNIX_OS.contains(&os.as_str()) {
            return EnvironmentKind::Headless;
        }
        EnvironmentKind::Unknown
    }

    pub async fn detect(&self) -> CapabilityReport {
        let environment = self.environment();
        let mut capabilities = BTreeSet::new();

        capabilities.insert(Capability::NetworkFetch);

        if let Some(dir) = &self.data_dir {
            if self.probe.data_dir_writable(dir).await {
                let kv_path = dir.join(&self.key_value_file);
                if self.probe.key_value_file_usable(&kv_path).await {
                    capabilities.insert(Capability::DurableSmallStorage);
                } else {
                    debug!(file = %kv_path.display(), "Key-value file unusable");
                }
                if self.probe.sqlite_available().await {
                    capabilities.insert(Capability::DurableDocumentStorage);
                }
            } else {
                debug!(dir = %dir.display(), "Data directory not writable");
            }
        }

        if self.audio_available {
            capabilities.insert(Capability::AudioPlayback);
        }

        let features = self.platform_features;
        if environment == EnvironmentKind::InteractiveUi {
            if features.notifications {
                capabilities.insert(Capability::SystemNotifications);
            }
            if features.clipboard {
                capabilities.insert(Capability::Clipboard);
            }
        }

        if features.share && SHARE_OS.contains(&self.probe.os().as_str()) {
            capabilities.insert(Capability::Share);
        }

        if environment != EnvironmentKind::Unknown {
            capabilities.insert(Capability::BackgroundSync);
        }

        if let Some(monitor) = &self.network_monitor {
            if monitor.is_connected().await {
                capabilities.insert(Capability::NetworkOnline);
            }
        }

        info!(?environment, ?capabilities, "Capabilities detected");
        CapabilityReport {
            environment,
            capabilities,
        }
    }
}

/// Pick an adapter for every domain from a capability report.
///
/// Storage falls back hybrid, then sync-backed, then document, then memory.
pub fn recommend(report: &CapabilityReport) -> AdapterConfig {
    let small = report.has(Capability::DurableSmallStorage);
    let document = report.has(Capability::DurableDocumentStorage);
    let automated = report.environment == EnvironmentKind::AutomatedTest;

    let storage = match (small, document) {
        (true, true) => StorageConfig::Hybrid(HybridOptions::default()),
        (true, false) => StorageConfig::SyncBacked(SyncBackedOptions::default()),
        (false, true) => StorageConfig::Document(DocumentOptions::default()),
        (false, false) => StorageConfig::Memory(MemoryOptions::default()),
    };

    let network = if report.has(Capability::NetworkFetch) {
        NetworkConfig::FetchBased(NetworkOptions::default())
    } else {
        NetworkConfig::Mock(NetworkOptions::default())
    };

    let audio = if report.has(Capability::AudioPlayback) && !automated {
        AudioConfig::NativeElement(AudioOptions::default())
    } else {
        AudioConfig::Mock(AudioOptions::default())
    };

    let platform = if automated {
        PlatformConfig::Mock
    } else {
        PlatformConfig::Native
    };

    AdapterConfig {
        storage,
        network,
        audio,
        platform,
    }
}
