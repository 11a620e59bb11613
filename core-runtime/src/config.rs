//! # Adapter Configuration
//!
//! Declares which adapter backs each domain (storage, network, audio,
//! platform) and with which options.
//!
//! ## Overview
//!
//! Each domain is a closed enum tagged by `type`, so an [`AdapterConfig`]
//! loads straight from JSON:
//!
//! ```json
//! {
//!   "storage": { "type": "hybrid", "prefix": "app" },
//!   "network": { "type": "fetch-based", "baseUrl": "https://api.example.org", "timeoutMs": 10000 },
//!   "audio":   { "type": "native-element", "defaultVolume": 0.8 },
//!   "platform": { "type": "native" }
//! }
//! ```
//!
//! Domains left out fall back to [`AdapterConfig::default`]. Every option is
//! optional; supplied options are shallow-merged over [`AdapterDefaults`]. A
//! supplied top-level option replaces the default wholesale, nested objects
//! such as `cache` and `retry` included.
//!
//! ## Validation
//!
//! [`AdapterConfig::validate`] rejects values no adapter could honor and
//! reports them as [`Error::Config`].

use bridge_desktop::{CacheSettings, NetworkSettings};
use bridge_traits::http::{RetryPolicy, MAX_BACKOFF_FACTOR};
use core_playback::PlaybackDefaults;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_DB_NAME: &str = "scripture";
pub const DEFAULT_FILE_NAME: &str = "local-storage.json";

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBackedOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// File inside the data directory holding the key-value map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Database name; the file is `<dbName>.sqlite3` inside the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_memory: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridOptions {
    /// Inherited by `small` and `large` when they carry no prefix of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<Box<StorageConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<Box<StorageConfig>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StorageConfig {
    Memory(MemoryOptions),
    SyncBacked(SyncBackedOptions),
    Document(DocumentOptions),
    Hybrid(HybridOptions),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory(MemoryOptions::default())
    }
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::SyncBacked(_) => "sync-backed",
            Self::Document(_) => "document",
            Self::Hybrid(_) => "hybrid",
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Memory(o) => o.prefix.as_deref(),
            Self::SyncBacked(o) => o.prefix.as_deref(),
            Self::Document(o) => o.prefix.as_deref(),
            Self::Hybrid(o) => o.prefix.as_deref(),
        }
    }

    /// Copy of `self` whose prefix is `prefix` unless it already has one.
    pub fn inheriting_prefix(&self, prefix: Option<&str>) -> Self {
        let mut config = self.clone();
        if config.prefix().is_none() {
            let inherited = prefix.map(str::to_string);
            match &mut config {
                Self::Memory(o) => o.prefix = inherited,
                Self::SyncBacked(o) => o.prefix = inherited,
                Self::Document(o) => o.prefix = inherited,
                Self::Hybrid(o) => o.prefix = inherited,
            }
        }
        config
    }

    fn validate(&self, nested: bool) -> Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::SyncBacked(o) => {
                if let Some(name) = &o.file_name {
                    validate_file_name("fileName", name)?;
                }
                if o.quota_bytes == Some(0) {
                    return Err(Error::Config(
                        "Storage quotaBytes must be greater than 0".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Document(o) => match &o.db_name {
                Some(name) => validate_file_name("dbName", name),
                None => Ok(()),
            },
            Self::Hybrid(o) => {
                if nested {
                    return Err(Error::Config(
                        "Hybrid storage cannot be nested inside another hybrid".to_string(),
                    ));
                }
                for child in [&o.small, &o.large].into_iter().flatten() {
                    child.validate(true)?;
                }
                Ok(())
            }
        }
    }
}

impl HybridOptions {
    /// Backend for key-value and batch operations; sync-backed unless set.
    pub fn small_config(&self) -> StorageConfig {
        self.small
            .as_deref()
            .cloned()
            .unwrap_or_else(|| StorageConfig::SyncBacked(SyncBackedOptions::default()))
            .inheriting_prefix(self.prefix.as_deref())
    }

    /// Backend for structured operations; document unless set.
    pub fn large_config(&self) -> StorageConfig {
        self.large
            .as_deref()
            .cloned()
            .unwrap_or_else(|| StorageConfig::Document(DocumentOptions::default()))
            .inheriting_prefix(self.prefix.as_deref())
    }
}

fn validate_file_name(option: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config(format!("Storage {} cannot be empty", option)));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::Config(format!(
            "Storage {} must be a plain file name, got '{}'",
            option, name
        )));
    }
    Ok(())
}

/// Defaults storage options are merged over.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDefaults {
    pub prefix: Option<String>,
    pub db_name: String,
    pub file_name: String,
    pub quota_bytes: Option<usize>,
    pub in_memory: bool,
}

impl Default for StorageDefaults {
    fn default() -> Self {
        Self {
            prefix: None,
            db_name: DEFAULT_DB_NAME.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            quota_bytes: None,
            in_memory: false,
        }
    }
}

/// Sync-backed options after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncBackedSettings {
    pub prefix: Option<String>,
    pub file_name: String,
    pub quota_bytes: Option<usize>,
}

/// Document options after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSettings {
    pub prefix: Option<String>,
    pub db_name: String,
    pub in_memory: bool,
}

impl MemoryOptions {
    pub fn resolve(&self, defaults: &StorageDefaults) -> Option<String> {
        self.prefix.clone().or_else(|| defaults.prefix.clone())
    }
}

impl SyncBackedOptions {
    pub fn resolve(&self, defaults: &StorageDefaults) -> SyncBackedSettings {
        SyncBackedSettings {
            prefix: self.prefix.clone().or_else(|| defaults.prefix.clone()),
            file_name: self
                .file_name
                .clone()
                .unwrap_or_else(|| defaults.file_name.clone()),
            quota_bytes: self.quota_bytes.or(defaults.quota_bytes),
        }
    }
}

impl DocumentOptions {
    pub fn resolve(&self, defaults: &StorageDefaults) -> DocumentSettings {
        DocumentSettings {
            prefix: self.prefix.clone().or_else(|| defaults.prefix.clone()),
            db_name: self
                .db_name
                .clone()
                .unwrap_or_else(|| defaults.db_name.clone()),
            in_memory: self.in_memory.unwrap_or(defaults.in_memory),
        }
    }
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

impl CacheOptions {
    fn to_settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.enabled,
            max_age: Duration::from_millis(self.max_age_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOptions {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl RetryOptions {
    fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_millis(self.delay_ms),
            backoff_factor: self.backoff_factor,
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_max_age_ms() -> u64 {
    300_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOptions>,
}

impl NetworkOptions {
    /// Shallow-merge these options over `defaults`.
    pub fn resolve(&self, defaults: &NetworkSettings) -> NetworkSettings {
        let mut settings = defaults.clone();
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(headers) = &self.headers {
            settings.headers = headers.clone();
        }
        if let Some(cache) = &self.cache {
            settings.cache = cache.to_settings();
        }
        if let Some(retry) = &self.retry {
            settings.retry = retry.to_policy();
        }
        settings
    }

    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            if !base_url.is_empty()
                && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
            {
                return Err(Error::Config(format!(
                    "Network baseUrl must be an http(s) URL, got '{}'",
                    base_url
                )));
            }
        }

        if self.timeout_ms == Some(0) {
            return Err(Error::Config(
                "Network timeoutMs must be greater than 0".to_string(),
            ));
        }

        if let Some(headers) = &self.headers {
            if headers.keys().any(|name| name.trim().is_empty()) {
                return Err(Error::Config(
                    "Network header names cannot be empty".to_string(),
                ));
            }
        }

        if let Some(retry) = &self.retry {
            if !retry.backoff_factor.is_finite()
                || retry.backoff_factor <= 0.0
                || retry.backoff_factor > MAX_BACKOFF_FACTOR
            {
                return Err(Error::Config(format!(
                    "Retry backoffFactor must be in (0, {}], got {}",
                    MAX_BACKOFF_FACTOR, retry.backoff_factor
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NetworkConfig {
    FetchBased(NetworkOptions),
    Mock(NetworkOptions),
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::FetchBased(NetworkOptions::default())
    }
}

impl NetworkConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchBased(_) => "fetch-based",
            Self::Mock(_) => "mock",
        }
    }

    pub fn options(&self) -> &NetworkOptions {
        match self {
            Self::FetchBased(o) | Self::Mock(o) => o,
        }
    }
}

// ============================================================================
// Audio
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_volume: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_playback_rate: Option<f32>,
}

impl AudioOptions {
    pub fn resolve(&self, defaults: &PlaybackDefaults) -> PlaybackDefaults {
        PlaybackDefaults {
            volume: self.default_volume.unwrap_or(defaults.volume),
            playback_rate: self.default_playback_rate.unwrap_or(defaults.playback_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AudioConfig {
    NativeElement(AudioOptions),
    Mock(AudioOptions),
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::Mock(AudioOptions::default())
    }
}

impl AudioConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NativeElement(_) => "native-element",
            Self::Mock(_) => "mock",
        }
    }

    pub fn options(&self) -> &AudioOptions {
        match self {
            Self::NativeElement(o) | Self::Mock(o) => o,
        }
    }
}

// ============================================================================
// Platform
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlatformConfig {
    #[default]
    Native,
    Mock,
}

impl PlatformConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Mock => "mock",
        }
    }
}

// ============================================================================
// Suite
// ============================================================================

/// Which adapter backs each domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub platform: PlatformConfig,
}

impl AdapterConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid adapter configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_platform(mut self, platform: PlatformConfig) -> Self {
        self.platform = platform;
        self
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Storage file and database names are plain, non-empty file names
    /// - Hybrid storage is not nested
    /// - Network base URL, timeout, headers and retry factor are usable
    /// - Audio defaults are a volume in `0..=1` and a positive playback rate
    pub fn validate(&self) -> Result<()> {
        self.storage.validate(false)?;
        self.network.options().validate()?;

        let audio = self.audio.options();
        let defaults = PlaybackDefaults {
            volume: audio.default_volume.unwrap_or(1.0),
            playback_rate: audio.default_playback_rate.unwrap_or(1.0),
        };
        defaults
            .validate()
            .map_err(|e| Error::Config(format!("Invalid audio defaults: {}", e)))?;

        Ok(())
    }
}

/// Per-domain values caller options are merged over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterDefaults {
    pub storage: StorageDefaults,
    pub network: NetworkSettings,
    pub audio: PlaybackDefaults,
}

impl AdapterDefaults {
    pub fn with_storage(mut self, storage: StorageDefaults) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_network(mut self, network: NetworkSettings) -> Self {
        self.network = network;
        self
    }

    pub fn with_audio(mut self, audio: PlaybackDefaults) -> Self {
        self.audio = audio;
        self
    }
}
