//! # Host Bridge Traits
//!
//! Contracts between the application core and the adapters that back it.
//!
//! ## Overview
//!
//! Runtime code depends only on the traits in this crate. Concrete adapters
//! live in `bridge-desktop` and `core-playback`, and the adapter factory in
//! `core-runtime` decides which ones a process gets.
//!
//! ## Traits
//!
//! ### Persistence
//! - [`StorageAdapter`](storage::StorageAdapter) - Key-value and structured-collection storage with change notification
//!
//! ### Networking
//! - [`NetworkAdapter`](http::NetworkAdapter) - HTTP, JSON fetch with TTL cache, downloads
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection
//!
//! ### Media & Platform
//! - [`AudioAdapter`](playback::AudioAdapter) - Handle-based playback with state events
//! - [`PlatformAdapter`](platform::PlatformAdapter) - Notifications, clipboard, share, sandboxed files
//!
//! ### Utilities
//! - [`ListenerRegistry`](listeners::ListenerRegistry) - Subscriber registry with explicit unsubscribe tokens
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Each domain has its own closed taxonomy in [`error`]: [`StorageError`],
//! [`NetworkError`], [`AudioError`], [`PlatformError`]. Implementations
//! translate native failures at the boundary and fall through to the
//! `Unknown` variant for anything unrecognized.
//!
//! ## Thread Safety
//!
//! All adapter traits require `Send + Sync` so a single instance can be
//! shared across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod listeners;
pub mod network;
pub mod platform;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::{
    AudioError, AudioResult, BridgeError, NetworkError, NetworkResult, PlatformError,
    PlatformResult, StorageError, StorageErrorCode, StorageResult,
};

// Re-export commonly used types
pub use http::{
    resolve_url, FetchOptions, HttpMethod, HttpRequest, HttpResponse, NetworkAdapter,
    RequestOptions, RetryPolicy,
};
pub use listeners::{ListenerRegistry, Subscription};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use platform::{Notification, PlatformAdapter, PlatformInfo, ShareRequest};
pub use playback::{
    AudioAdapter, AudioHandle, PlayOptions, PlaybackEvent, PlaybackListener, PlaybackState,
};
pub use storage::{
    ChangeEvent, ChangeListener, KeyNamespace, StorageAdapter, StorageAdapterExt, StoredValue,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
