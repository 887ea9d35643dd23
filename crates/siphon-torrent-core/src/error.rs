//! Error types for torrent acquisition services.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

use crate::model::TorrentHandle;

/// Boxed error used to carry backend-specific failures across the trait seam.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Primary error type for downloader and session operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The URI scheme is neither `magnet:` nor `http(s):`.
    #[error("unsupported torrent uri")]
    UnsupportedUri {
        /// URI supplied by the caller.
        uri: String,
    },
    /// Downloading torrent metadata over HTTP failed.
    #[error("torrent metadata fetch failed")]
    MetadataFetchFailed {
        /// URI that was being fetched.
        uri: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Downloading torrent metadata over HTTP exceeded its deadline.
    #[error("torrent metadata fetch timed out")]
    FetchTimeout {
        /// URI that was being fetched.
        uri: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The backend rejected the configured credentials.
    #[error("backend authentication failed")]
    Authentication {
        /// Operation that required authentication.
        operation: &'static str,
    },
    /// The backend did not acknowledge a torrent submission.
    #[error("backend rejected torrent submission")]
    SubmissionRejected {
        /// Response body returned instead of the acknowledgement.
        response: String,
    },
    /// Torrent was not found in the backend listing.
    #[error("torrent not found")]
    NotFound {
        /// Operation that looked the torrent up.
        operation: &'static str,
        /// Handle that was missing, when one was known.
        handle: Option<TorrentHandle>,
    },
    /// The session or downloader was used after it was closed.
    #[error("torrent object already closed")]
    Closed {
        /// Operation attempted after close.
        operation: &'static str,
    },
    /// Operation is not supported by the active backend.
    #[error("torrent operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Operation failed in the underlying backend.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent handle when available.
        handle: Option<TorrentHandle>,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

impl TorrentError {
    /// Whether a caller may reasonably retry the same operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchTimeout { .. }
                | Self::MetadataFetchFailed { .. }
                | Self::Authentication { .. }
                | Self::NotFound { .. }
                | Self::OperationFailed { .. }
        )
    }
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;
