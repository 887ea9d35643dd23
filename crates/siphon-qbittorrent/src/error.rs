//! Error types for the qBittorrent client.

use siphon_torrent_core::{TorrentError, TorrentHandle};
use thiserror::Error;

/// Failures raised by [`crate::QBittorrentClient`].
#[derive(Debug, Error)]
pub enum QbError {
    /// The configured base URL could not be parsed.
    #[error("invalid qBittorrent url")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build qBittorrent http client")]
    ClientBuild {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },
    /// The daemon rejected the configured credentials.
    #[error("qBittorrent rejected credentials")]
    Authentication {
        /// Operation that required a session.
        operation: &'static str,
    },
    /// The request could not be delivered or the response could not be read.
    #[error("qBittorrent request failed")]
    Transport {
        /// Operation being performed.
        operation: &'static str,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The daemon answered with a non-success status.
    #[error("unexpected qBittorrent response status")]
    Status {
        /// Operation being performed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// The response body did not match the expected shape.
    #[error("malformed qBittorrent response")]
    Decode {
        /// Operation being performed.
        operation: &'static str,
        /// Decode failure.
        #[source]
        source: reqwest::Error,
    },
}

impl QbError {
    /// Whether the failure is a credential rejection.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Convert into the backend-neutral taxonomy.
    #[must_use]
    pub fn into_torrent_error(
        self,
        operation: &'static str,
        handle: Option<TorrentHandle>,
    ) -> TorrentError {
        match self {
            Self::Authentication { operation } => TorrentError::Authentication { operation },
            other => TorrentError::OperationFailed {
                operation,
                handle,
                source: Box::new(other),
            },
        }
    }
}

/// Convenience alias for client results.
pub type QbResult<T> = Result<T, QbError>;
