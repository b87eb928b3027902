use async_trait::async_trait;

use crate::BoxError;

/// External error-tracking collaborator (Sentry-shaped). Capturing never
/// replaces returning the error to the caller.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, context: &str, error: &(dyn std::error::Error + 'static));
}

/// Writes an export artifact under a storage root and returns the path it
/// can be served from. The driver behind it (local disk, object storage) is
/// not this crate's concern.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, BoxError>;
}

/// Encodes a header + row matrix into spreadsheet bytes. The actual
/// spreadsheet library stays behind this seam.
pub trait SpreadsheetWriter: Send + Sync {
    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, BoxError>;
}

/// Reporter that only logs. Used when no external tracker is configured.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn capture(&self, context: &str, error: &(dyn std::error::Error + 'static)) {
        tracing::error!(context, error = %error, "captured error");
    }
}
