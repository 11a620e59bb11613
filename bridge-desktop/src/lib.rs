//! # Desktop Bridge Implementations
//!
//! Implementations of the bridge traits for desktop hosts
//! (macOS, Windows, Linux) plus scripted mocks.
//!
//! ## Overview
//!
//! - Storage backends: [`MemoryStorage`], [`SyncBackedStorage`] over a
//!   [`SyncKeyValueStore`], [`DocumentStorage`] on SQLite, and the
//!   [`HybridStorage`] router
//! - [`FetchNetworkAdapter`] using `reqwest`, with a [`TtlCache`]
//! - [`DesktopNetworkMonitor`] using a TCP reachability probe
//! - [`DesktopPlatformAdapter`] using `tokio::fs` under the data root
//! - [`MockNetworkAdapter`] and [`MockPlatformAdapter`] for tests and
//!   automated environments
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DocumentStorage, FileKeyValueStore, HybridStorage, SyncBackedStorage};
//! use std::sync::Arc;
//!
//! let small = SyncBackedStorage::new(Arc::new(FileKeyValueStore::open(path, None)?), None);
//! let large = DocumentStorage::file(db_path, None);
//! let storage = HybridStorage::new(Arc::new(small), Arc::new(large));
//! ```

pub mod cache;
mod http;
pub mod mock;
mod network;
mod platform;
pub mod storage;

pub use cache::{CacheEntry, TtlCache};
pub use http::{CacheSettings, FetchNetworkAdapter, NetworkSettings};
pub use mock::{MockNetworkAdapter, MockPlatformAdapter};
pub use network::{DesktopNetworkMonitor, DEFAULT_PROBE_ADDR};
pub use platform::{default_data_dir, DesktopPlatformAdapter};
pub use storage::{
    DocumentLocation, DocumentStorage, FileKeyValueStore, HybridStorage, InMemoryKeyValueStore,
    KeyValueStoreError, MemoryStorage, MemoryStore, SyncBackedStorage, SyncKeyValueStore,
};
