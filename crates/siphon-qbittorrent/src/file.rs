//! File entry and handle adapters over a qBittorrent torrent.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use siphon_torrent_core::{
    FilePriority, FileStats, TorrentError, TorrentFileEntry, TorrentFileHandle, TorrentResult,
};
use tokio::sync::watch;
use tracing::debug;

use crate::session::SessionShared;
use crate::types::{TorrentFileInfo, priority_from_wire, priority_to_wire};

/// Stats channel shared by every open handle on the same file.
#[derive(Debug)]
pub(crate) struct OpenFile {
    pub(crate) stats: watch::Sender<FileStats>,
    holders: AtomicUsize,
}

/// A file listed by `torrents/files`.
#[derive(Debug)]
pub struct QBittorrentFileEntry {
    shared: Arc<SessionShared>,
    index: u32,
    path: String,
    length: u64,
    priority: FilePriority,
    initial_stats: FileStats,
}

impl QBittorrentFileEntry {
    pub(crate) fn new(shared: Arc<SessionShared>, index: u32, info: &TorrentFileInfo) -> Self {
        Self {
            shared,
            index,
            path: info.name.clone(),
            length: info.size,
            priority: priority_from_wire(info.priority),
            initial_stats: info.to_file_stats(),
        }
    }
}

#[async_trait]
impl TorrentFileEntry for QBittorrentFileEntry {
    fn index(&self) -> u32 {
        self.index
    }

    fn path_in_torrent(&self) -> &str {
        &self.path
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn resolved_path(&self) -> PathBuf {
        self.shared.save_dir.join(&self.path)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn open(&self) -> TorrentResult<Arc<dyn TorrentFileHandle>> {
        if self.shared.is_closed() {
            return Err(TorrentError::Closed {
                operation: "open_file",
            });
        }
        let stats = {
            let mut open = self.shared.open_files.lock().await;
            let slot = open.entry(self.index).or_insert_with(|| {
                Arc::new(OpenFile {
                    stats: watch::channel(self.initial_stats).0,
                    holders: AtomicUsize::new(0),
                })
            });
            slot.holders.fetch_add(1, Ordering::SeqCst);
            slot.stats.subscribe()
        };
        debug!(torrent = %self.shared.handle, index = self.index, "file handle opened");
        Ok(Arc::new(QBittorrentFileHandle {
            shared: Arc::clone(&self.shared),
            index: self.index,
            priority: Mutex::new(self.priority),
            stats,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Open handle on one file; keeps per-file stats polling alive while held.
#[derive(Debug)]
pub struct QBittorrentFileHandle {
    shared: Arc<SessionShared>,
    index: u32,
    priority: Mutex<FilePriority>,
    stats: watch::Receiver<FileStats>,
    closed: AtomicBool,
}

#[async_trait]
impl TorrentFileHandle for QBittorrentFileHandle {
    fn index(&self) -> u32 {
        self.index
    }

    fn priority(&self) -> FilePriority {
        *self.priority.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn set_priority(&self, priority: FilePriority) -> TorrentResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.shared.is_closed() {
            return Err(TorrentError::Closed {
                operation: "set_priority",
            });
        }
        let accepted = self
            .shared
            .client
            .set_file_priority(&self.shared.handle, &[self.index], priority_to_wire(priority))
            .await;
        if !accepted {
            return Err(TorrentError::OperationFailed {
                operation: "set_priority",
                handle: Some(self.shared.handle.clone()),
                source: "qBittorrent did not accept the priority change".into(),
            });
        }
        *self.priority.lock().unwrap_or_else(PoisonError::into_inner) = priority;
        Ok(())
    }

    fn stats(&self) -> watch::Receiver<FileStats> {
        self.stats.clone()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut open = self.shared.open_files.lock().await;
        let released = open
            .get(&self.index)
            .is_some_and(|slot| slot.holders.fetch_sub(1, Ordering::SeqCst) == 1);
        if released {
            open.remove(&self.index);
        }
    }
}
