//! Segment attempt error type, classified by the worker's migration logic.

use thiserror::Error;

/// Error from a single segment attempt. The worker decides from the variant
/// whether the route is retired (proxy circuits on transport-level errors)
/// and whether the failure is recoverable by migration at all.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// libcurl reported an error (connect failure, reset, timeout, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The stream ended with a different byte count than the requested
    /// range (server closed early, or ignored the Range header). Treated
    /// like a transport error; accepting it would corrupt the merge.
    #[error("expected {expected} bytes, got {received}")]
    LengthMismatch { expected: u64, received: u64 },
    /// Part-file write failed (disk full, permissions). Fatal to the whole
    /// invocation; changing routes cannot fix it.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}
