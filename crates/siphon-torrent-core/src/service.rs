//! Backend-neutral downloader, session and file contracts.
//!
//! # Design
//! - Every backend (embedded or remote daemon) implements the same small set of traits.
//! - Stats are published through `watch` channels; the owning poll task is the only writer.
//! - Operations a backend cannot perform default to `TorrentError::Unsupported`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{BoxError, TorrentError, TorrentResult};
use crate::model::{
    DownloaderStats, EncodedTorrentInfo, FilePriority, FileStats, SessionStats, TorrentHandle,
    TorrentLibInfo,
};

/// Fetches remote files over HTTP on behalf of a downloader.
#[async_trait]
pub trait HttpFileDownloader: Send + Sync {
    /// Download the full body at `url`.
    async fn download(&self, url: &str) -> Result<Vec<u8>, BoxError>;
}

/// One connection to a torrent backend plus every session opened through it.
#[async_trait]
pub trait TorrentDownloader: Send + Sync {
    /// Identity of the backend library.
    fn vendor(&self) -> TorrentLibInfo;

    /// Subscribe to aggregate transfer counters.
    fn stats(&self) -> watch::Receiver<DownloaderStats>;

    /// Resolve a URI into an encoded torrent payload.
    ///
    /// # Errors
    ///
    /// `UnsupportedUri` for schemes other than magnet/http(s), `FetchTimeout` when
    /// the download exceeds `timeout`, and `MetadataFetchFailed` for other
    /// download failures.
    async fn fetch_torrent(&self, uri: &str, timeout: Duration)
    -> TorrentResult<EncodedTorrentInfo>;

    /// Submit a torrent to the backend and open a session for it.
    ///
    /// # Errors
    ///
    /// Returns an error when authentication fails, the backend rejects the
    /// submission, or the new torrent cannot be discovered.
    async fn start_download(&self, info: &EncodedTorrentInfo)
    -> TorrentResult<Arc<dyn TorrentSession>>;

    /// Directory that holds the data of `handle`.
    fn save_dir_for(&self, handle: &TorrentHandle) -> PathBuf;

    /// Every directory this downloader may have written data into.
    fn list_saves(&self) -> Vec<PathBuf>;

    /// Handles of sessions that are still open.
    async fn open_sessions(&self) -> Vec<TorrentHandle>;

    /// Close all sessions and release the backend connection.
    async fn close(&self);
}

/// Lifecycle of one torrent inside one backend instance.
#[async_trait]
pub trait TorrentSession: Send + Sync {
    /// Backend identity of the torrent.
    fn handle(&self) -> &TorrentHandle;

    /// Subscribe to this torrent's stats.
    fn stats(&self) -> watch::Receiver<SessionStats>;

    /// Torrent display name; fetched once and cached.
    ///
    /// # Errors
    ///
    /// `NotFound` when the backend does not list the torrent yet, `Closed` after close.
    async fn name(&self) -> TorrentResult<String>;

    /// File entries of the torrent; fetched once and cached.
    ///
    /// # Errors
    ///
    /// `NotFound` when the backend does not list the files yet, `Closed` after close.
    async fn files(&self) -> TorrentResult<Vec<Arc<dyn TorrentFileEntry>>>;

    /// Pause transfer at the backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses or does not support the call.
    async fn pause(&self) -> TorrentResult<()> {
        Err(TorrentError::Unsupported { operation: "pause" })
    }

    /// Resume transfer at the backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses or does not support the call.
    async fn resume(&self) -> TorrentResult<()> {
        Err(TorrentError::Unsupported {
            operation: "resume",
        })
    }

    /// Remove the torrent from the backend, optionally deleting its data.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses or does not support the call.
    async fn delete(&self, delete_files: bool) -> TorrentResult<()> {
        let _ = delete_files;
        Err(TorrentError::Unsupported {
            operation: "delete",
        })
    }

    /// Close the session when no file handle is open; returns whether it closed.
    async fn close_if_not_in_use(&self) -> bool;

    /// Stop local polling. Backend data is left untouched.
    async fn close(&self);
}

/// A file inside a torrent, resolved against the session's save directory.
#[async_trait]
pub trait TorrentFileEntry: Send + Sync {
    /// Backend file index.
    fn index(&self) -> u32;

    /// Path relative to the torrent root.
    fn path_in_torrent(&self) -> &str;

    /// File length in bytes.
    fn length(&self) -> u64;

    /// Absolute path on the backend's filesystem.
    fn resolved_path(&self) -> PathBuf;

    /// Whether the file may be read while still downloading.
    fn supports_streaming(&self) -> bool;

    /// Open a handle that tracks stats and controls priority.
    ///
    /// # Errors
    ///
    /// `Closed` when the owning session has been closed.
    async fn open(&self) -> TorrentResult<Arc<dyn TorrentFileHandle>>;
}

/// An open file within a session.
#[async_trait]
pub trait TorrentFileHandle: Send + Sync {
    /// Backend file index.
    fn index(&self) -> u32;

    /// Last priority applied through this handle.
    fn priority(&self) -> FilePriority;

    /// Change the download priority of the file.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend refuses or does not support the call.
    async fn set_priority(&self, priority: FilePriority) -> TorrentResult<()> {
        let _ = priority;
        Err(TorrentError::Unsupported {
            operation: "set_priority",
        })
    }

    /// Subscribe to per-file stats.
    fn stats(&self) -> watch::Receiver<FileStats>;

    /// Release the handle.
    async fn close(&self);
}
