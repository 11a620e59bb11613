//! Workspace facade.
//!
//! Re-exports the adapter layer so host applications can depend on
//! `scripture-workspace` alone: the contracts from `bridge-traits`, the
//! native adapters from `bridge-desktop`, playback from `core-playback`, and
//! the factory and configuration from `core-runtime`.

pub use bridge_desktop as desktop;
pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_runtime::{
    AdapterConfig, AdapterFactory, AdapterSuite, Capability, CapabilityDetector, Error,
    HostBridges, Result,
};
