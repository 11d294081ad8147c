//! Error types for the Flickr provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Flickr provider errors
#[derive(Error, Debug)]
pub enum FlickrError {
    /// The API answered with `stat: fail`
    #[error("Flickr API error {code}: {message}")]
    ApiFailure { code: i64, message: String },

    /// Unexpected HTTP status
    #[error("Flickr returned HTTP {status_code}: {message}")]
    HttpStatus { status_code: u16, message: String },

    /// The response lacks a field or container we rely on
    #[error("Malformed Flickr response: {0}")]
    Malformed(String),

    /// Not enough routing information to address an original
    #[error("Photo {id} cannot be located: {reason}")]
    Unlocatable { id: String, reason: String },

    /// Upload was rejected
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Flickr operations
pub type Result<T> = std::result::Result<T, FlickrError>;

impl From<FlickrError> for BridgeError {
    fn from(error: FlickrError) -> Self {
        match error {
            FlickrError::ApiFailure { code, message } => {
                BridgeError::OperationFailed(format!("Flickr API error {}: {}", code, message))
            }
            FlickrError::HttpStatus {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            FlickrError::Malformed(msg) => BridgeError::Protocol(msg),
            FlickrError::Unlocatable { id, reason } => {
                BridgeError::OperationFailed(format!("Photo {} cannot be located: {}", id, reason))
            }
            FlickrError::UploadFailed(msg) => {
                BridgeError::OperationFailed(format!("Upload failed: {}", msg))
            }
            FlickrError::Bridge(e) => e,
        }
    }
}
