//! Per-torrent session over a qBittorrent daemon.
//!
//! # Design
//! - Name and file list are fetched at most once and then served from cache.
//! - A poll task is the only writer of the session's stats channel; failures
//!   leave the previous snapshot in place.
//! - Closing stops local polling only; the daemon keeps the torrent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use siphon_torrent_core::{
    SessionStats, TorrentError, TorrentFileEntry, TorrentHandle, TorrentResult, TorrentSession,
};
use tokio::sync::{Mutex, OnceCell, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::QBittorrentClient;
use crate::file::{OpenFile, QBittorrentFileEntry};
use crate::poller::PollTask;
use crate::types::TorrentInfo;

/// State shared between a session, its poll task and its file adapters.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) client: Arc<QBittorrentClient>,
    pub(crate) handle: TorrentHandle,
    pub(crate) save_dir: PathBuf,
    pub(crate) open_files: Mutex<HashMap<u32, Arc<OpenFile>>>,
    token: CancellationToken,
}

impl SessionShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    fn matches(&self, torrent: &TorrentInfo) -> bool {
        torrent.hash.eq_ignore_ascii_case(self.handle.as_str())
    }

    async fn lookup(&self, operation: &'static str) -> TorrentResult<Option<TorrentInfo>> {
        let listing = self
            .client
            .get_torrents(None, slice::from_ref(&self.handle))
            .await
            .map_err(|err| err.into_torrent_error(operation, Some(self.handle.clone())))?;
        Ok(listing.into_iter().find(|torrent| self.matches(torrent)))
    }
}

struct StatsPoll {
    shared: Arc<SessionShared>,
    stats: watch::Sender<SessionStats>,
}

impl StatsPoll {
    async fn refresh(&self) {
        match self.shared.lookup("session_stats").await {
            Ok(Some(torrent)) => {
                self.stats.send_replace(torrent.to_session_stats());
            }
            Ok(None) => warn!(
                torrent = %self.shared.handle,
                "torrent missing from qBittorrent listing; keeping last stats"
            ),
            Err(err) => warn!(
                torrent = %self.shared.handle,
                error = %err,
                "session stats poll failed"
            ),
        }
        self.refresh_files().await;
    }

    async fn refresh_files(&self) {
        let open: HashMap<u32, Arc<OpenFile>> = self.shared.open_files.lock().await.clone();
        if open.is_empty() {
            return;
        }
        let files = match self.shared.client.get_torrent_files(&self.shared.handle).await {
            Ok(files) => files,
            Err(err) => {
                warn!(torrent = %self.shared.handle, error = %err, "file stats poll failed");
                return;
            }
        };
        for (position, file) in files.iter().enumerate() {
            let index = file
                .index
                .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
            if let Some(slot) = open.get(&index) {
                slot.stats.send_replace(file.to_file_stats());
            }
        }
    }
}

/// One torrent tracked through a qBittorrent daemon.
pub struct QBittorrentSession {
    shared: Arc<SessionShared>,
    stats: watch::Receiver<SessionStats>,
    name: OnceCell<String>,
    files: OnceCell<Vec<Arc<QBittorrentFileEntry>>>,
    poll: PollTask,
}

impl QBittorrentSession {
    pub(crate) fn start(
        client: Arc<QBittorrentClient>,
        discovered: &TorrentInfo,
        save_dir: PathBuf,
        poll_interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            client,
            handle: TorrentHandle::new(discovered.hash.clone()),
            save_dir,
            open_files: Mutex::new(HashMap::new()),
            token: token.clone(),
        });
        let (tx, rx) = watch::channel(discovered.to_session_stats());
        let state = Arc::new(StatsPoll {
            shared: Arc::clone(&shared),
            stats: tx,
        });
        let poll = PollTask::spawn("session-stats", poll_interval, token, move || {
            let state = Arc::clone(&state);
            async move { state.refresh().await }
        });
        Self {
            shared,
            stats: rx,
            name: OnceCell::new(),
            files: OnceCell::new(),
            poll,
        }
    }

    /// Directory the torrent's files are resolved against.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.shared.save_dir
    }

    /// Whether the session has been closed directly or through its downloader.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    fn ensure_open(&self, operation: &'static str) -> TorrentResult<()> {
        if self.shared.is_closed() {
            return Err(TorrentError::Closed { operation });
        }
        Ok(())
    }

    fn control_result(&self, operation: &'static str, accepted: bool) -> TorrentResult<()> {
        if accepted {
            Ok(())
        } else {
            Err(TorrentError::OperationFailed {
                operation,
                handle: Some(self.shared.handle.clone()),
                source: "qBittorrent did not accept the call".into(),
            })
        }
    }
}

#[async_trait]
impl TorrentSession for QBittorrentSession {
    fn handle(&self) -> &TorrentHandle {
        &self.shared.handle
    }

    fn stats(&self) -> watch::Receiver<SessionStats> {
        self.stats.clone()
    }

    async fn name(&self) -> TorrentResult<String> {
        self.ensure_open("name")?;
        let name = self
            .name
            .get_or_try_init(|| async {
                self.shared
                    .lookup("name")
                    .await?
                    .map(|torrent| torrent.name)
                    .ok_or_else(|| TorrentError::NotFound {
                        operation: "name",
                        handle: Some(self.shared.handle.clone()),
                    })
            })
            .await?;
        Ok(name.clone())
    }

    async fn files(&self) -> TorrentResult<Vec<Arc<dyn TorrentFileEntry>>> {
        self.ensure_open("files")?;
        let entries = self
            .files
            .get_or_try_init(|| async {
                let files = self
                    .shared
                    .client
                    .get_torrent_files(&self.shared.handle)
                    .await
                    .map_err(|err| err.into_torrent_error("files", Some(self.shared.handle.clone())))?;
                if files.is_empty() {
                    return Err(TorrentError::NotFound {
                        operation: "files",
                        handle: Some(self.shared.handle.clone()),
                    });
                }
                Ok(files
                    .iter()
                    .enumerate()
                    .map(|(position, file)| {
                        let index = file
                            .index
                            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
                        Arc::new(QBittorrentFileEntry::new(Arc::clone(&self.shared), index, file))
                    })
                    .collect::<Vec<_>>())
            })
            .await?;
        Ok(entries
            .iter()
            .map(|entry| Arc::clone(entry) as Arc<dyn TorrentFileEntry>)
            .collect())
    }

    async fn pause(&self) -> TorrentResult<()> {
        self.ensure_open("pause")?;
        let accepted = self
            .shared
            .client
            .pause_torrents(slice::from_ref(&self.shared.handle))
            .await;
        self.control_result("pause", accepted)
    }

    async fn resume(&self) -> TorrentResult<()> {
        self.ensure_open("resume")?;
        let accepted = self
            .shared
            .client
            .resume_torrents(slice::from_ref(&self.shared.handle))
            .await;
        self.control_result("resume", accepted)
    }

    async fn delete(&self, delete_files: bool) -> TorrentResult<()> {
        self.ensure_open("delete")?;
        let accepted = self
            .shared
            .client
            .delete_torrents(slice::from_ref(&self.shared.handle), delete_files)
            .await;
        self.control_result("delete", accepted)
    }

    async fn close_if_not_in_use(&self) -> bool {
        if !self.shared.open_files.lock().await.is_empty() {
            return false;
        }
        self.close().await;
        true
    }

    async fn close(&self) {
        let was_open = !self.shared.is_closed();
        self.poll.stop().await;
        self.shared.open_files.lock().await.clear();
        if was_open {
            info!(torrent = %self.shared.handle, "session closed");
        }
    }
}
