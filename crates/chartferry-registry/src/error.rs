//! Error types for registry operations

use thiserror::Error;

/// Registry operation errors
#[derive(Debug, Error)]
pub enum RegistryError {
    // ============ Configuration Errors ============
    #[error("Invalid registry URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid registry configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Network Errors ============
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    // ============ Upload Errors ============
    #[error("Upload rejected with HTTP {status} {reason}")]
    UploadRejected { status: u16, reason: String },

    #[error("Registry reported an error while uploading: {message}")]
    UploadFailed { message: String },

    #[error("Chart has not been saved by the registry (saved={saved})")]
    NotSaved { saved: String },

    // ============ Index Errors ============
    #[error("Chart {name}-{version} not indexed after {attempts} attempt(s) (last status {last_status})")]
    NotIndexed {
        name: String,
        version: String,
        attempts: u32,
        last_status: u16,
    },

    #[error("Version mismatch in uploaded chart: got {actual}, expected {expected}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Chart {name}-{version} has no download URL")]
    NoDownloadUrl { name: String, version: String },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RegistryError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RegistryError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RegistryError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RegistryError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(e: url::ParseError) -> Self {
        RegistryError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

impl RegistryError {
    /// The request never produced a response
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RegistryError::NetworkError { .. } | RegistryError::Timeout { .. }
        )
    }
}
