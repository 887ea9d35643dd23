//! qBittorrent backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use siphon_config::{PeerFilterSettings, TorrentDownloaderConfig, TorrentDownloaderType};
use siphon_qbittorrent::{
    DownloaderOptions, QBittorrentClient, QBittorrentDownloader, ReqwestFileDownloader,
};
use siphon_torrent_core::{HttpFileDownloader, TorrentDownloader};
use tracing::{info, warn};

use crate::backend::{BackendCapabilities, EngineBackend};
use crate::error::{EngineError, EngineResult};

const KIND: TorrentDownloaderType = TorrentDownloaderType::QBittorrent;
const FILE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates [`QBittorrentDownloader`]s from the `qbittorrent` settings record.
pub struct QBittorrentBackend {
    files: Arc<dyn HttpFileDownloader>,
    options: DownloaderOptions,
}

impl QBittorrentBackend {
    /// Backend with a default `.torrent` file downloader and polling cadence.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new() -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(FILE_FETCH_TIMEOUT)
            .build()
            .map_err(|err| EngineError::Backend {
                kind: KIND,
                source: Box::new(err),
            })?;
        Ok(Self::with_parts(
            Arc::new(ReqwestFileDownloader::new(http)),
            DownloaderOptions::default(),
        ))
    }

    /// Backend with explicit collaborators.
    #[must_use]
    pub fn with_parts(files: Arc<dyn HttpFileDownloader>, options: DownloaderOptions) -> Self {
        Self { files, options }
    }
}

#[async_trait]
impl EngineBackend for QBittorrentBackend {
    fn kind(&self) -> TorrentDownloaderType {
        KIND
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            live_reconfigure: false,
            peer_filter: false,
        }
    }

    fn settings_changed(
        &self,
        previous: &TorrentDownloaderConfig,
        next: &TorrentDownloaderConfig,
    ) -> bool {
        previous.qbittorrent != next.qbittorrent
    }

    async fn new_instance(
        &self,
        config: &TorrentDownloaderConfig,
    ) -> EngineResult<Arc<dyn TorrentDownloader>> {
        let downloader =
            QBittorrentDownloader::new(&config.qbittorrent, Arc::clone(&self.files), self.options)
                .map_err(|err| EngineError::Backend {
                    kind: KIND,
                    source: Box::new(err),
                })?;
        info!(url = %config.qbittorrent.url, "qBittorrent downloader created");
        Ok(Arc::new(downloader))
    }

    async fn test_connection(&self, config: &TorrentDownloaderConfig) -> bool {
        let client = match QBittorrentClient::new(&config.qbittorrent) {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "qBittorrent connection test failed");
                return false;
            }
        };
        match client.login().await {
            Ok(_) => {
                client.forget_session().await;
                true
            }
            Err(err) => {
                warn!(error = %err, url = %config.qbittorrent.url, "qBittorrent connection test failed");
                false
            }
        }
    }

    async fn apply_config(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        _config: &TorrentDownloaderConfig,
    ) {
        info!("qBittorrent settings changed; restart the engine to apply them");
    }

    async fn apply_peer_filter(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        filter: &PeerFilterSettings,
    ) {
        if filter.is_active() {
            info!("qBittorrent does not support client-side peer filtering; policy ignored");
        }
    }
}
