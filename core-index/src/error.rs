use bridge_traits::BridgeError;
use core_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the durable key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize store {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Store {} has unsupported version {version}", .path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid image file {}: {reason}", .path.display())]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed remote response: {0}")]
    RemoteProtocol(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to fetch {} item(s) after retries: {}", .ids.len(), .ids.join(", "))]
    FetchIncomplete { ids: Vec<String> },

    #[error("Failed to fetch item {id}: {source}")]
    Fetch { id: String, source: BridgeError },

    #[error("Remote service error: {0}")]
    Remote(BridgeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndexError {
    pub(crate) fn invalid_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IndexError::InvalidFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<BridgeError> for IndexError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Protocol(message) => IndexError::RemoteProtocol(message),
            other => IndexError::Remote(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
