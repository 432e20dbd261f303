use thiserror::Error;

/// Top-level error type for the `meshlink-driver` capability surface.
///
/// Concrete drivers map their transport failures into these variants;
/// `meshlink-core` translates them into caller-facing diagnostics.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport-level I/O failure (port unavailable, link dropped, ...).
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The operation did not complete within the allotted time.
    #[error("operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The session is no longer live.
    #[error("session closed")]
    SessionClosed,

    /// The device accepted the command but reported a failure.
    #[error("device rejected command: {message}")]
    Rejected { message: String },

    /// The driver does not implement this operation for the transport.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },
}
