use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic bridge failure used by host-level utilities (log sinks, monitors).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

// ============================================================================
// Storage
// ============================================================================

/// Machine-readable storage error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageErrorCode {
    QuotaExceeded,
    NotAvailable,
    PermissionDenied,
    NotFound,
    InvalidData,
    Unknown,
}

impl StorageErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::NotAvailable => "NOT_AVAILABLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidData => "INVALID_DATA",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Error surfaced by every storage backend.
///
/// Backends translate their native failures into one of these variants at
/// the boundary; nothing backend-specific escapes to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Storage backend not available: {0}")]
    NotAvailable(String),

    #[error("Storage permission denied: {0}")]
    PermissionDenied(String),

    #[error("Storage entry not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Storage operation failed: {0}")]
    Unknown(String),
}

impl StorageError {
    pub fn code(&self) -> StorageErrorCode {
        match self {
            Self::QuotaExceeded(_) => StorageErrorCode::QuotaExceeded,
            Self::NotAvailable(_) => StorageErrorCode::NotAvailable,
            Self::PermissionDenied(_) => StorageErrorCode::PermissionDenied,
            Self::NotFound(_) => StorageErrorCode::NotFound,
            Self::InvalidData(_) => StorageErrorCode::InvalidData,
            Self::Unknown(_) => StorageErrorCode::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::QuotaExceeded(m)
            | Self::NotAvailable(m)
            | Self::PermissionDenied(m)
            | Self::NotFound(m)
            | Self::InvalidData(m)
            | Self::Unknown(m) => m,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidData(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkErrorCode {
    Timeout,
    Offline,
    Aborted,
    NotFound,
    ServerError,
    NetworkError,
    ParseError,
    Unknown,
}

impl NetworkErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Offline => "OFFLINE",
            Self::Aborted => "ABORTED",
            Self::NotFound => "NOT_FOUND",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network offline: {0}")]
    Offline(String),

    #[error("Request aborted: {0}")]
    Aborted(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request failed: {0}")]
    Unknown(String),
}

impl NetworkError {
    /// Map a non-2xx HTTP status to the taxonomy.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            404 => NetworkError::NotFound(format!("{} returned 404", url)),
            500..=599 => NetworkError::ServerError(format!("{} returned {}", url, status)),
            _ => NetworkError::Unknown(format!("{} returned {}", url, status)),
        }
    }

    pub fn code(&self) -> NetworkErrorCode {
        match self {
            Self::Timeout(_) => NetworkErrorCode::Timeout,
            Self::Offline(_) => NetworkErrorCode::Offline,
            Self::Aborted(_) => NetworkErrorCode::Aborted,
            Self::NotFound(_) => NetworkErrorCode::NotFound,
            Self::ServerError(_) => NetworkErrorCode::ServerError,
            Self::NetworkError(_) => NetworkErrorCode::NetworkError,
            Self::ParseError(_) => NetworkErrorCode::ParseError,
            Self::Unknown(_) => NetworkErrorCode::Unknown,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::NetworkError(_) | Self::ServerError(_)
        )
    }
}

pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

// ============================================================================
// Audio
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioErrorCode {
    NotSupported,
    PermissionDenied,
    NotFound,
    Unknown,
    NetworkError,
    DecodeError,
    Aborted,
}

impl AudioErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Unknown => "UNKNOWN",
            Self::NetworkError => "NETWORK_ERROR",
            Self::DecodeError => "DECODE_ERROR",
            Self::Aborted => "ABORTED",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Audio not supported: {0}")]
    NotSupported(String),

    #[error("Audio playback not permitted: {0}")]
    PermissionDenied(String),

    #[error("Audio source not found: {0}")]
    NotFound(String),

    #[error("Audio playback failed: {0}")]
    Unknown(String),

    #[error("Audio network error: {0}")]
    NetworkError(String),

    #[error("Audio decode error: {0}")]
    DecodeError(String),

    #[error("Audio playback aborted: {0}")]
    Aborted(String),
}

impl AudioError {
    pub fn code(&self) -> AudioErrorCode {
        match self {
            Self::NotSupported(_) => AudioErrorCode::NotSupported,
            Self::PermissionDenied(_) => AudioErrorCode::PermissionDenied,
            Self::NotFound(_) => AudioErrorCode::NotFound,
            Self::Unknown(_) => AudioErrorCode::Unknown,
            Self::NetworkError(_) => AudioErrorCode::NetworkError,
            Self::DecodeError(_) => AudioErrorCode::DecodeError,
            Self::Aborted(_) => AudioErrorCode::Aborted,
        }
    }
}

pub type AudioResult<T> = std::result::Result<T, AudioError>;

// ============================================================================
// Platform
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformErrorCode {
    NotSupported,
    PermissionDenied,
    NotFound,
    Unknown,
    InvalidPath,
}

impl PlatformErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Unknown => "UNKNOWN",
            Self::InvalidPath => "INVALID_PATH",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Platform feature not supported: {0}")]
    NotSupported(String),

    #[error("Platform permission denied: {0}")]
    PermissionDenied(String),

    #[error("Platform resource not found: {0}")]
    NotFound(String),

    #[error("Platform operation failed: {0}")]
    Unknown(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl PlatformError {
    pub fn code(&self) -> PlatformErrorCode {
        match self {
            Self::NotSupported(_) => PlatformErrorCode::NotSupported,
            Self::PermissionDenied(_) => PlatformErrorCode::PermissionDenied,
            Self::NotFound(_) => PlatformErrorCode::NotFound,
            Self::Unknown(_) => PlatformErrorCode::Unknown,
            Self::InvalidPath(_) => PlatformErrorCode::InvalidPath,
        }
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PlatformError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                PlatformError::PermissionDenied(err.to_string())
            }
            _ => PlatformError::Unknown(err.to_string()),
        }
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
