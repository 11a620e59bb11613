//! In-memory platform adapter that records UI interactions.

use async_trait::async_trait;
use bridge_traits::{
    error::{PlatformError, PlatformResult},
    platform::{
        sanitize_relative_path, Notification, PlatformAdapter, PlatformFeatures, PlatformInfo,
        ShareRequest,
    },
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Default)]
struct MockPlatformState {
    files: BTreeMap<PathBuf, Bytes>,
    clipboard: Option<String>,
    notifications: Vec<Notification>,
    shares: Vec<ShareRequest>,
}

#[derive(Default)]
pub struct MockPlatformAdapter {
    state: Mutex<MockPlatformState>,
}

impl MockPlatformAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn shares(&self) -> Vec<ShareRequest> {
        self.state.lock().shares.clone()
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatformAdapter {
    fn adapter_name(&self) -> &'static str {
        "mock"
    }

    fn info(&self) -> PlatformInfo {
        PlatformInfo {
            os: "mock".to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: "mock".to_string(),
        }
    }

    fn features(&self) -> PlatformFeatures {
        PlatformFeatures::all()
    }

    async fn notify(&self, notification: Notification) -> PlatformResult<()> {
        self.state.lock().notifications.push(notification);
        Ok(())
    }

    async fn read_clipboard(&self) -> PlatformResult<String> {
        Ok(self.state.lock().clipboard.clone().unwrap_or_default())
    }

    async fn write_clipboard(&self, text: &str) -> PlatformResult<()> {
        self.state.lock().clipboard = Some(text.to_string());
        Ok(())
    }

    async fn share(&self, request: ShareRequest) -> PlatformResult<()> {
        self.state.lock().shares.push(request);
        Ok(())
    }

    async fn read_file(&self, path: &str) -> PlatformResult<Bytes> {
        let key = sanitize_relative_path(path)?;
        self.state
            .lock()
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, data: Bytes) -> PlatformResult<()> {
        let key = sanitize_relative_path(path)?;
        self.state.lock().files.insert(key, data);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> PlatformResult<()> {
        let key = sanitize_relative_path(path)?;
        match self.state.lock().files.remove(&key) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound(path.to_string())),
        }
    }
}
