//! Scripted adapters for tests and automated runs.

mod network;
mod platform;

pub use network::MockNetworkAdapter;
pub use platform::MockPlatformAdapter;
