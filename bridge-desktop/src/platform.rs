//! Platform adapter for desktop hosts using Tokio file I/O

use async_trait::async_trait;
use bridge_traits::{
    error::{PlatformError, PlatformResult},
    platform::{
        sanitize_relative_path, Notification, PlatformAdapter, PlatformFeatures, PlatformInfo,
        ShareRequest,
    },
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR: &str = "scripture";

/// Default application data directory
///
/// Falls back to `~/.local/share` when the platform has no data dir, and to
/// the working directory when there is no home either.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join(APP_DIR)
}

/// Desktop platform adapter
///
/// File operations are confined to `data_root`. Notifications, clipboard and
/// share need a windowing toolkit and report `NOT_SUPPORTED`.
pub struct DesktopPlatformAdapter {
    data_root: PathBuf,
}

impl DesktopPlatformAdapter {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    fn resolve(&self, path: &str) -> PlatformResult<PathBuf> {
        Ok(self.data_root.join(sanitize_relative_path(path)?))
    }

    fn unsupported(feature: &str) -> PlatformError {
        PlatformError::NotSupported(format!("{} is not available on desktop", feature))
    }
}

impl Default for DesktopPlatformAdapter {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

#[async_trait]
impl PlatformAdapter for DesktopPlatformAdapter {
    fn adapter_name(&self) -> &'static str {
        "native"
    }

    fn info(&self) -> PlatformInfo {
        PlatformInfo::current()
    }

    fn features(&self) -> PlatformFeatures {
        PlatformFeatures::default()
    }

    async fn notify(&self, _notification: Notification) -> PlatformResult<()> {
        Err(Self::unsupported("notifications"))
    }

    async fn read_clipboard(&self) -> PlatformResult<String> {
        Err(Self::unsupported("clipboard"))
    }

    async fn write_clipboard(&self, _text: &str) -> PlatformResult<()> {
        Err(Self::unsupported("clipboard"))
    }

    async fn share(&self, _request: ShareRequest) -> PlatformResult<()> {
        Err(Self::unsupported("share"))
    }

    async fn read_file(&self, path: &str) -> PlatformResult<Bytes> {
        let full = self.resolve(path)?;
        let data = fs::read(&full).await?;
        debug!(path = ?full, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &str, data: Bytes) -> PlatformResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&full, data.as_ref()).await?;
        debug!(path = ?full, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> PlatformResult<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).await?;
        debug!(path = ?full, "Deleted file");
        Ok(())
    }
}
