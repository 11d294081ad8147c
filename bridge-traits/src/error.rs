use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Transport-level failure (connect, timeout, reset). Worth retrying.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The remote answered, but not with the structure we asked for.
    #[error("Malformed remote response: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether a later attempt of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::Network("reset".to_string()).is_transient());
        assert!(BridgeError::Io(std::io::Error::other("broken pipe")).is_transient());

        assert!(!BridgeError::HttpStatus {
            status: 404,
            message: "gone".to_string()
        }
        .is_transient());
        assert!(!BridgeError::Protocol("no photos".to_string()).is_transient());
        assert!(!BridgeError::OperationFailed("nope".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let error = BridgeError::HttpStatus {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(error.to_string(), "Unexpected HTTP status 403: Forbidden");
    }
}
