//! Downloader bound to one qBittorrent daemon.
//!
//! # Design
//! - A poll task republishes global transfer counters; failures keep the stale value.
//! - Submissions are followed by a bounded discovery loop because the add
//!   endpoint does not return the new torrent's hash.
//! - Every session inherits a child of the downloader's cancellation token so
//!   closing the downloader stops all polling.
//! - The session map sits behind a blocking lock that is never held across an
//!   await; closed sessions are pruned whenever the map is touched.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use siphon_config::QBittorrentSettings;
use siphon_torrent_core::{
    DownloaderStats, EncodedTorrentInfo, HttpFileDownloader, SessionStats, TorrentDownloader,
    TorrentError, TorrentHandle, TorrentLibInfo, TorrentResult, TorrentSession,
};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::QBittorrentClient;
use crate::discovery::{select_new_torrent, snapshot};
use crate::error::QbResult;
use crate::poller::PollTask;
use crate::session::QBittorrentSession;
use crate::types::{AddTorrentResponse, TorrentInfo};

const VENDOR: &str = "qBittorrent";
const SUPPORTED_VERSIONS: &str = "4.1+";

/// Timing knobs for polling and post-submission discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloaderOptions {
    /// Interval between stats polls for the downloader and its sessions.
    pub poll_interval: Duration,
    /// Listing attempts made while waiting for a submitted torrent to appear.
    pub discovery_attempts: u32,
    /// Delay between discovery attempts.
    pub discovery_interval: Duration,
}

impl Default for DownloaderOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            discovery_attempts: 30,
            discovery_interval: Duration::from_secs(1),
        }
    }
}

type SessionMap = Arc<RwLock<HashMap<TorrentHandle, Arc<QBittorrentSession>>>>;

fn write_sessions(
    sessions: &RwLock<HashMap<TorrentHandle, Arc<QBittorrentSession>>>,
) -> RwLockWriteGuard<'_, HashMap<TorrentHandle, Arc<QBittorrentSession>>> {
    let mut guard = sessions.write().unwrap_or_else(PoisonError::into_inner);
    guard.retain(|_, session| !session.is_closed());
    guard
}

struct TransferPoll {
    client: Arc<QBittorrentClient>,
    sessions: SessionMap,
    stats: watch::Sender<DownloaderStats>,
}

impl TransferPoll {
    async fn refresh(&self) {
        let Some(info) = self.client.get_transfer_info().await else {
            debug!("transfer info unavailable; keeping previous stats");
            return;
        };
        let tracked: Vec<SessionStats> = write_sessions(&self.sessions)
            .values()
            .map(|session| session.stats().borrow().clone())
            .collect();
        let stats = DownloaderStats {
            downloaded_bytes: info.dl_info_data,
            uploaded_bytes: info.up_info_data,
            download_speed: info.dl_info_speed,
            upload_speed: info.up_info_speed,
            updated_at: Some(Utc::now()),
            ..DownloaderStats::default()
        }
        .with_sessions(&tracked);
        self.stats.send_replace(stats);
    }
}

/// [`TorrentDownloader`] speaking the qBittorrent Web API.
pub struct QBittorrentDownloader {
    client: Arc<QBittorrentClient>,
    files: Arc<dyn HttpFileDownloader>,
    save_dir: Option<PathBuf>,
    options: DownloaderOptions,
    sessions: SessionMap,
    stats: watch::Receiver<DownloaderStats>,
    shutdown: CancellationToken,
    poll: PollTask,
    closed: AtomicBool,
}

impl QBittorrentDownloader {
    /// Connect to the daemon described by `settings` and start stats polling.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error when the client cannot be constructed from `settings`.
    pub fn new(
        settings: &QBittorrentSettings,
        files: Arc<dyn HttpFileDownloader>,
        options: DownloaderOptions,
    ) -> QbResult<Self> {
        let client = Arc::new(QBittorrentClient::new(settings)?);
        let save_dir = settings.save_dir.trim();
        let save_dir = (!save_dir.is_empty()).then(|| PathBuf::from(save_dir));
        Ok(Self::with_client(client, files, save_dir, options))
    }

    /// Build around an existing client.
    #[must_use]
    pub fn with_client(
        client: Arc<QBittorrentClient>,
        files: Arc<dyn HttpFileDownloader>,
        save_dir: Option<PathBuf>,
        options: DownloaderOptions,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (tx, rx) = watch::channel(DownloaderStats::default());
        let sessions: SessionMap = Arc::default();
        let state = Arc::new(TransferPoll {
            client: Arc::clone(&client),
            sessions: Arc::clone(&sessions),
            stats: tx,
        });
        let poll = PollTask::spawn(
            "downloader-stats",
            options.poll_interval,
            shutdown.child_token(),
            move || {
                let state = Arc::clone(&state);
                async move { state.refresh().await }
            },
        );
        Self {
            client,
            files,
            save_dir,
            options,
            sessions,
            stats: rx,
            shutdown,
            poll,
            closed: AtomicBool::new(false),
        }
    }

    /// Underlying REST client.
    #[must_use]
    pub fn client(&self) -> &Arc<QBittorrentClient> {
        &self.client
    }

    fn ensure_open(&self, operation: &'static str) -> TorrentResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TorrentError::Closed { operation });
        }
        Ok(())
    }

    fn save_path_param(&self) -> Option<String> {
        self.save_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned())
    }

    async fn list(&self, operation: &'static str) -> TorrentResult<Vec<TorrentInfo>> {
        self.client
            .get_torrents(None, &[])
            .await
            .map_err(|err| err.into_torrent_error(operation, None))
    }

    async fn submit(&self, info: &EncodedTorrentInfo) -> TorrentResult<()> {
        let save_path = self.save_path_param();
        let response = match info.as_magnet() {
            Some(magnet) => self.client.add_magnet(magnet, save_path.as_deref()).await,
            None => {
                self.client
                    .add_torrent_file(info.as_bytes().to_vec(), save_path.as_deref())
                    .await
            }
        }
        .map_err(|err| err.into_torrent_error("add", None))?;

        match response {
            AddTorrentResponse::Accepted => Ok(()),
            AddTorrentResponse::Rejected { body } => {
                Err(TorrentError::SubmissionRejected { response: body })
            }
        }
    }

    async fn discover(
        &self,
        known: &HashSet<String>,
        hash_hint: Option<&str>,
    ) -> TorrentResult<TorrentInfo> {
        let attempts = self.options.discovery_attempts.max(1);
        for attempt in 1..=attempts {
            let listing = self.list("start_download").await?;
            if let Some(found) = select_new_torrent(&listing, known, hash_hint) {
                info!(torrent = %found.hash, attempt, "submitted torrent discovered");
                return Ok(found.clone());
            }
            debug!(attempt, attempts, "submitted torrent not listed yet");
            if attempt < attempts {
                tokio::select! {
                    () = self.shutdown.cancelled() => {
                        return Err(TorrentError::Closed { operation: "start_download" });
                    }
                    () = sleep(self.options.discovery_interval) => {}
                }
            }
        }
        warn!(attempts, "submitted torrent never appeared in qBittorrent listing");
        Err(TorrentError::NotFound {
            operation: "start_download",
            handle: hash_hint.map(TorrentHandle::new),
        })
    }
}

#[async_trait]
impl TorrentDownloader for QBittorrentDownloader {
    fn vendor(&self) -> TorrentLibInfo {
        TorrentLibInfo {
            vendor: VENDOR.to_string(),
            version: SUPPORTED_VERSIONS.to_string(),
            supports_streaming: true,
        }
    }

    fn stats(&self) -> watch::Receiver<DownloaderStats> {
        self.stats.clone()
    }

    async fn fetch_torrent(
        &self,
        uri: &str,
        timeout_after: Duration,
    ) -> TorrentResult<EncodedTorrentInfo> {
        if uri.starts_with("magnet:") {
            return Ok(EncodedTorrentInfo::from_magnet(uri));
        }
        if !(uri.starts_with("http://") || uri.starts_with("https://")) {
            return Err(TorrentError::UnsupportedUri {
                uri: uri.to_string(),
            });
        }
        match timeout(timeout_after, self.files.download(uri)).await {
            Ok(Ok(bytes)) => Ok(EncodedTorrentInfo::new(bytes)),
            Ok(Err(source)) => Err(TorrentError::MetadataFetchFailed {
                uri: uri.to_string(),
                source,
            }),
            Err(_) => Err(TorrentError::FetchTimeout {
                uri: uri.to_string(),
                timeout: timeout_after,
            }),
        }
    }

    async fn start_download(
        &self,
        info: &EncodedTorrentInfo,
    ) -> TorrentResult<Arc<dyn TorrentSession>> {
        self.ensure_open("start_download")?;
        self.client
            .login()
            .await
            .map_err(|err| err.into_torrent_error("login", None))?;

        let known = snapshot(&self.list("start_download").await?);
        self.submit(info).await?;
        let hint = info.info_hash_hint();
        let discovered = self.discover(&known, hint.as_deref()).await?;

        let save_dir = self
            .save_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&discovered.save_path));
        let session = Arc::new(QBittorrentSession::start(
            Arc::clone(&self.client),
            &discovered,
            save_dir,
            self.options.poll_interval,
            self.shutdown.child_token(),
        ));
        // `close` flips the flag before draining, so checking it under the
        // lock guarantees the session is either drained or never inserted.
        let inserted = {
            let mut sessions = write_sessions(&self.sessions);
            if self.closed.load(Ordering::SeqCst) {
                None
            } else {
                Some(sessions.insert(session.handle().clone(), Arc::clone(&session)))
            }
        };
        match inserted {
            None => {
                session.close().await;
                Err(TorrentError::Closed {
                    operation: "start_download",
                })
            }
            Some(displaced) => {
                if let Some(previous) = displaced {
                    previous.close().await;
                }
                Ok(session)
            }
        }
    }

    fn save_dir_for(&self, handle: &TorrentHandle) -> PathBuf {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(handle).map_or_else(
            || self.save_dir.clone().unwrap_or_default(),
            |session| session.save_dir().to_path_buf(),
        )
    }

    fn list_saves(&self) -> Vec<PathBuf> {
        self.save_dir.iter().cloned().collect()
    }

    async fn open_sessions(&self) -> Vec<TorrentHandle> {
        let mut handles: Vec<TorrentHandle> =
            write_sessions(&self.sessions).keys().cloned().collect();
        handles.sort();
        handles
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let sessions: Vec<Arc<QBittorrentSession>> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        join_all(sessions.iter().map(|session| session.close())).await;
        self.shutdown.cancel();
        self.poll.stop().await;
        self.client.forget_session().await;
        info!(sessions = sessions.len(), "qBittorrent downloader closed");
    }
}
