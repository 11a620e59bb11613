//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Public DNS resolver used as the default reachability target
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";

/// Desktop network monitor implementation
///
/// Connectivity is decided by opening a TCP connection to a probe address
/// within a timeout. Platform-specific interface APIs are not consulted, so
/// the network type is always [`NetworkType::Other`] when connected.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    last_info: Mutex<Option<NetworkInfo>>,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE_ADDR, Duration::from_secs(5))
    }

    /// Probe `addr` (host:port) instead of the default resolver
    pub fn with_probe(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe_addr: addr.into(),
            probe_timeout: timeout,
            last_info: Mutex::new(None),
        }
    }

    /// Most recent probe result, if any
    pub fn last_info(&self) -> Option<NetworkInfo> {
        self.last_info.lock().clone()
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(&self.probe_addr)).await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            // Desktop connections are typically not metered
            is_metered: false,
        };

        *self.last_info.lock() = Some(info.clone());
        debug!(status = ?status, probe = %self.probe_addr, "Network info updated");

        Ok(info)
    }
}
