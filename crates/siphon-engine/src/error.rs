//! Error types for engine lifecycle operations.

use siphon_config::TorrentDownloaderType;
use siphon_torrent_core::{BoxError, TorrentError};
use thiserror::Error;

/// Primary error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No downloader has been created yet.
    #[error("torrent engine not initialized")]
    NotInitialized,
    /// The engine was closed.
    #[error("torrent engine closed")]
    Closed,
    /// No implementation is available for the selected backend kind.
    #[error("torrent backend unavailable")]
    BackendUnavailable {
        /// Selected backend kind.
        kind: TorrentDownloaderType,
    },
    /// The backend failed to construct a downloader.
    #[error("torrent backend failed to start")]
    Backend {
        /// Backend kind.
        kind: TorrentDownloaderType,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// A downloader operation failed.
    #[error("torrent operation failed")]
    Torrent {
        /// Underlying failure.
        #[source]
        source: TorrentError,
    },
}

impl From<TorrentError> for EngineError {
    fn from(source: TorrentError) -> Self {
        Self::Torrent { source }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
