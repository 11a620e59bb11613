//! Platform Integration Abstraction
//!
//! Host information, notifications, clipboard, share sheet, and file access
//! confined to the application's data root.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{PlatformError, PlatformResult};

/// Host description reported by [`PlatformAdapter::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub family: String,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
        }
    }
}

/// UI integrations an adapter actually delivers. Anything left `false`
/// fails with `NOT_SUPPORTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFeatures {
    pub notifications: bool,
    pub clipboard: bool,
    pub share: bool,
}

impl PlatformFeatures {
    pub fn all() -> Self {
        Self {
            notifications: true,
            clipboard: true,
            share: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
}

/// Validate a path relative to the data root.
///
/// Absolute paths, prefixes, and `..` components are rejected with
/// `INVALID_PATH`.
pub fn sanitize_relative_path(path: &str) -> PlatformResult<PathBuf> {
    if path.trim().is_empty() {
        return Err(PlatformError::InvalidPath("empty path".to_string()));
    }

    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PlatformError::InvalidPath(format!(
                    "{} escapes the data directory",
                    path
                )));
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(PlatformError::InvalidPath(format!("{} names no file", path)));
    }
    Ok(clean)
}

/// Platform adapter trait
///
/// Only file access is expected everywhere; the other features fail with
/// `NOT_SUPPORTED` on hosts without them.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn adapter_name(&self) -> &'static str;

    fn info(&self) -> PlatformInfo;

    /// Which of notify, clipboard and share this adapter can perform.
    fn features(&self) -> PlatformFeatures;

    async fn notify(&self, notification: Notification) -> PlatformResult<()>;

    async fn read_clipboard(&self) -> PlatformResult<String>;

    async fn write_clipboard(&self, text: &str) -> PlatformResult<()>;

    async fn share(&self, request: ShareRequest) -> PlatformResult<()>;

    /// Read a file relative to the data root.
    async fn read_file(&self, path: &str) -> PlatformResult<Bytes>;

    /// Write a file relative to the data root, creating parent directories.
    async fn write_file(&self, path: &str, data: Bytes) -> PlatformResult<()>;

    async fn delete_file(&self, path: &str) -> PlatformResult<()>;
}
