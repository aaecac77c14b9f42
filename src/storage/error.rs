//! Adapter error taxonomy.
//!
//! Backend errors are logged where they happen and then mapped onto one of
//! these variants. Messages only carry the object key or the failing setting,
//! never the backend's own error text, so callers cannot branch on which
//! provider is configured.

use thiserror::Error;

/// Errors returned by the adapter and its backends.
#[derive(Error, Debug)]
pub enum BucketError {
    /// A setting an operation needs is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The `NAME` selector does not match any registered backend.
    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("Authentication failed")]
    Authentication,

    #[error("Upload failed for {0}")]
    Upload(String),

    #[error("Download failed for {0}")]
    Download(String),

    #[error("Cannot sign URL for {0}")]
    Signing(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("{operation} is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: &'static str,
        backend: &'static str,
    },

    #[error("Unsupported blob shape: {0}")]
    UnsupportedBlobShape(String),

    /// Any other failed request against the bucket.
    #[error("Request {operation} failed for {key}")]
    Request { operation: &'static str, key: String },
}

/// Result type for adapter operations
pub type BucketResult<T> = Result<T, BucketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_error_hides_detail() {
        let error = BucketError::Authentication;
        assert_eq!(error.to_string(), "Authentication failed");
    }

    #[test]
    fn test_unsupported_operation_message() {
        let error = BucketError::UnsupportedOperation {
            operation: "get_head_object",
            backend: "gcs",
        };
        assert_eq!(
            error.to_string(),
            "get_head_object is not supported by the gcs backend"
        );
    }

    #[test]
    fn test_messages_carry_key() {
        assert_eq!(
            BucketError::NotFound("report.pdf".to_string()).to_string(),
            "Object not found: report.pdf"
        );
        assert_eq!(
            BucketError::Upload("report.pdf".to_string()).to_string(),
            "Upload failed for report.pdf"
        );
        let error = BucketError::Request {
            operation: "stat",
            key: "a/b.txt".to_string(),
        };
        assert_eq!(error.to_string(), "Request stat failed for a/b.txt");
    }

    #[test]
    fn test_error_debug() {
        let error = BucketError::Config("BUCKET_NAME".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("Config"));
    }
}
