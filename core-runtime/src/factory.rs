//! # Adapter Factory
//!
//! Turns an [`AdapterConfig`] into an [`AdapterSuite`]: one adapter per
//! domain, handed out as trait objects.
//!
//! Host-provided pieces (data directory, media elements, network monitor,
//! clock) come in through [`HostBridges`]. A durable storage kind without a
//! data directory, or `native-element` audio without a media factory, fails
//! with [`Error::CapabilityMissing`].
//!
//! ```ignore
//! use core_runtime::factory::{AdapterFactory, HostBridges};
//!
//! let factory = AdapterFactory::new(HostBridges::default().with_data_dir(data_dir));
//! let suite = factory.create_recommended(&factory.detector()).await?;
//! suite.storage.set("lastChapter", serde_json::json!("JHN.3")).await?;
//! suite.dispose().await?;
//! ```

use bridge_desktop::storage::sync_backed::map_store_error;
use bridge_desktop::{
    default_data_dir, DesktopPlatformAdapter, DocumentStorage, FetchNetworkAdapter,
    FileKeyValueStore, HybridStorage, MemoryStorage, MemoryStore, MockNetworkAdapter,
    MockPlatformAdapter, SyncBackedStorage,
};
use bridge_traits::{
    http::NetworkAdapter,
    network::NetworkMonitor,
    platform::PlatformAdapter,
    playback::AudioAdapter,
    storage::StorageAdapter,
    time::{Clock, SystemClock},
};
use core_playback::{ElementAudioAdapter, MediaElementFactory, MockMediaElementFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{
    AdapterConfig, AdapterDefaults, AudioConfig, NetworkConfig, PlatformConfig, StorageConfig,
};
use crate::detector::{recommend, CapabilityDetector, EnvironmentProbe, SystemProbe};
use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, strip_path};

/// What the host brings to adapter construction.
#[derive(Clone)]
pub struct HostBridges {
    /// Root for durable storage and platform files
    pub data_dir: Option<PathBuf>,
    pub media_factory: Option<Arc<dyn MediaElementFactory>>,
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
    pub clock: Arc<dyn Clock>,
}

impl Default for HostBridges {
    fn default() -> Self {
        Self {
            data_dir: None,
            media_factory: None,
            network_monitor: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl HostBridges {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_media_factory(mut self, factory: Arc<dyn MediaElementFactory>) -> Self {
        self.media_factory = Some(factory);
        self
    }

    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// One adapter per domain plus the configuration they were built from.
pub struct AdapterSuite {
    pub storage: Arc<dyn StorageAdapter>,
    pub network: Arc<dyn NetworkAdapter>,
    pub audio: Arc<dyn AudioAdapter>,
    pub platform: Arc<dyn PlatformAdapter>,
    pub config: AdapterConfig,
}

impl AdapterSuite {
    /// Stop every audio handle and release storage resources.
    pub async fn dispose(&self) -> Result<()> {
        self.audio.stop_all().await;
        self.storage.dispose().await?;
        info!("Adapter suite disposed");
        Ok(())
    }
}

pub struct AdapterFactory {
    host: HostBridges,
    defaults: AdapterDefaults,
}

impl AdapterFactory {
    pub fn new(host: HostBridges) -> Self {
        Self {
            host,
            defaults: AdapterDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: AdapterDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn host(&self) -> &HostBridges {
        &self.host
    }

    pub fn defaults(&self) -> &AdapterDefaults {
        &self.defaults
    }

    /// Detector over the real environment, seeded with this factory's host
    /// bridges.
    pub fn detector(&self) -> CapabilityDetector {
        self.detector_with_probe(Arc::new(SystemProbe))
    }

    /// Detector over `probe`, seeded with this factory's host bridges and
    /// with the features of the native platform adapter it would build.
    pub fn detector_with_probe(&self, probe: Arc<dyn EnvironmentProbe>) -> CapabilityDetector {
        let features = self.create_platform(&PlatformConfig::Native).features();
        let mut detector = CapabilityDetector::new(probe)
            .with_audio(self.host.media_factory.is_some())
            .with_platform_features(features)
            .with_key_value_file(self.defaults.storage.file_name.clone());
        if let Some(dir) = &self.host.data_dir {
            detector = detector.with_data_dir(dir.clone());
        }
        if let Some(monitor) = &self.host.network_monitor {
            detector = detector.with_network_monitor(Arc::clone(monitor));
        }
        detector
    }

    pub fn create_suite(&self, config: AdapterConfig) -> Result<AdapterSuite> {
        config.validate()?;

        let storage = self.create_storage(&config.storage)?;
        let network = self.create_network(&config.network)?;
        let audio = self.create_audio(&config.audio)?;
        let platform = self.create_platform(&config.platform);

        info!(
            storage = storage.backend_name(),
            network = network.adapter_name(),
            audio = audio.adapter_name(),
            platform = platform.adapter_name(),
            "Adapter suite created"
        );

        Ok(AdapterSuite {
            storage,
            network,
            audio,
            platform,
            config,
        })
    }

    /// Detect capabilities and build the suite they recommend.
    pub async fn create_recommended(&self, detector: &CapabilityDetector) -> Result<AdapterSuite> {
        let report = detector.detect().await;
        self.create_suite(recommend(&report))
    }

    pub fn create_storage(&self, config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>> {
        let defaults = &self.defaults.storage;

        let storage: Arc<dyn StorageAdapter> = match config {
            StorageConfig::Memory(options) => Arc::new(MemoryStorage::shared(
                MemoryStore::new(),
                options.resolve(defaults),
            )),
            StorageConfig::SyncBacked(options) => {
                let settings = options.resolve(defaults);
                let path = self.data_dir_for(config)?.join(&settings.file_name);
                let store = FileKeyValueStore::open(path.clone(), settings.quota_bytes)
                    .map_err(|e| map_store_error(e, "Failed to open key-value file"))?;
                debug!(file = %strip_path(&path.to_string_lossy()), "Key-value file ready");
                Arc::new(SyncBackedStorage::new(Arc::new(store), settings.prefix))
            }
            StorageConfig::Document(options) => {
                let settings = options.resolve(defaults);
                if settings.in_memory {
                    Arc::new(DocumentStorage::in_memory(settings.prefix))
                } else {
                    let path = self
                        .data_dir_for(config)?
                        .join(format!("{}.sqlite3", settings.db_name));
                    debug!(file = %strip_path(&path.to_string_lossy()), "Document database configured");
                    Arc::new(DocumentStorage::file(path, settings.prefix))
                }
            }
            StorageConfig::Hybrid(options) => {
                let small = self.create_storage(&options.small_config())?;
                let large = self.create_storage(&options.large_config())?;
                Arc::new(HybridStorage::new(small, large))
            }
        };

        Ok(storage)
    }

    pub fn create_network(&self, config: &NetworkConfig) -> Result<Arc<dyn NetworkAdapter>> {
        let settings = config.options().resolve(&self.defaults.network);
        for (name, value) in &settings.headers {
            debug!(header = %name, value = %redact_if_sensitive(name, value), "Default request header");
        }

        let clock = Arc::clone(&self.host.clock);
        let network: Arc<dyn NetworkAdapter> = match config {
            NetworkConfig::FetchBased(_) => {
                let mut adapter = FetchNetworkAdapter::new(settings, clock)
                    .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
                if let Some(monitor) = &self.host.network_monitor {
                    adapter = adapter.with_monitor(Arc::clone(monitor));
                }
                Arc::new(adapter)
            }
            NetworkConfig::Mock(_) => Arc::new(MockNetworkAdapter::new(settings, clock)),
        };

        Ok(network)
    }

    pub fn create_audio(&self, config: &AudioConfig) -> Result<Arc<dyn AudioAdapter>> {
        let defaults = config.options().resolve(&self.defaults.audio);

        let audio: Arc<dyn AudioAdapter> = match config {
            AudioConfig::NativeElement(_) => {
                let factory = self.host.media_factory.clone().ok_or_else(|| {
                    Error::capability_missing(
                        "MediaElementFactory",
                        "Audio kind 'native-element' plays through host media elements. \
                         Provide HostBridges::with_media_factory or choose 'mock' audio.",
                    )
                })?;
                Arc::new(ElementAudioAdapter::new(factory, defaults))
            }
            AudioConfig::Mock(_) => Arc::new(
                ElementAudioAdapter::new(Arc::new(MockMediaElementFactory::new()), defaults)
                    .named("mock"),
            ),
        };

        Ok(audio)
    }

    pub fn create_platform(&self, config: &PlatformConfig) -> Arc<dyn PlatformAdapter> {
        match config {
            PlatformConfig::Native => {
                let root = self.host.data_dir.clone().unwrap_or_else(default_data_dir);
                Arc::new(DesktopPlatformAdapter::new(root))
            }
            PlatformConfig::Mock => Arc::new(MockPlatformAdapter::new()),
        }
    }

    fn data_dir_for(&self, config: &StorageConfig) -> Result<&Path> {
        self.host.data_dir.as_deref().ok_or_else(|| {
            Error::capability_missing(
                "DataDirectory",
                format!(
                    "Storage kind '{}' persists to disk and needs a data directory. \
                     Provide HostBridges::with_data_dir or choose 'memory' storage.",
                    config.kind()
                ),
            )
        })
    }
}
