//! Backend contract shared by every downloader implementation.
//!
//! # Design
//! - One small interface per backend kind: create, probe, reconfigure, filter.
//! - Capability gaps are explicit no-ops that log, never missing methods.
//! - The registry always answers for every kind so selection never fails to resolve.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use siphon_config::{PeerFilterSettings, TorrentDownloaderConfig, TorrentDownloaderType};
use siphon_torrent_core::TorrentDownloader;

use crate::error::EngineResult;
use crate::qbittorrent::QBittorrentBackend;
use crate::unavailable::UnavailableBackend;

/// What a backend can do without recreating its downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// Settings changes can be applied to a live downloader.
    pub live_reconfigure: bool,
    /// Peer filter policy is enforced by the backend.
    pub peer_filter: bool,
}

/// Factory and lifecycle hooks for one backend kind.
#[async_trait]
pub trait EngineBackend: Send + Sync {
    /// Kind this backend serves.
    fn kind(&self) -> TorrentDownloaderType;

    /// Capability flags.
    fn capabilities(&self) -> BackendCapabilities;

    /// Whether this build can create downloaders for the kind.
    fn is_supported(&self) -> bool {
        true
    }

    /// Whether the settings this backend reads differ between two configurations.
    fn settings_changed(
        &self,
        previous: &TorrentDownloaderConfig,
        next: &TorrentDownloaderConfig,
    ) -> bool;

    /// Create a downloader from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unavailable or its settings are unusable.
    async fn new_instance(
        &self,
        config: &TorrentDownloaderConfig,
    ) -> EngineResult<Arc<dyn TorrentDownloader>>;

    /// Check connectivity using a throwaway client; never touches live downloaders.
    async fn test_connection(&self, config: &TorrentDownloaderConfig) -> bool;

    /// Apply changed settings to a live downloader.
    async fn apply_config(
        &self,
        downloader: &Arc<dyn TorrentDownloader>,
        config: &TorrentDownloaderConfig,
    );

    /// Apply peer filter policy to a live downloader.
    async fn apply_peer_filter(
        &self,
        downloader: &Arc<dyn TorrentDownloader>,
        filter: &PeerFilterSettings,
    );
}

/// Backend implementation per kind.
pub struct BackendRegistry {
    backends: HashMap<TorrentDownloaderType, Arc<dyn EngineBackend>>,
}

impl BackendRegistry {
    /// Registry with the qBittorrent backend and placeholders for every other kind.
    ///
    /// # Errors
    ///
    /// Returns an error when the shared HTTP client cannot be built.
    pub fn with_defaults() -> EngineResult<Self> {
        let mut registry = Self::unavailable();
        registry.register(Arc::new(QBittorrentBackend::new()?));
        Ok(registry)
    }

    /// Registry where every kind is a placeholder.
    #[must_use]
    pub fn unavailable() -> Self {
        let backends = TorrentDownloaderType::ALL
            .into_iter()
            .map(|kind| {
                let backend: Arc<dyn EngineBackend> = Arc::new(UnavailableBackend::new(kind));
                (kind, backend)
            })
            .collect();
        Self { backends }
    }

    /// Install `backend` for its kind, replacing any previous entry.
    pub fn register(&mut self, backend: Arc<dyn EngineBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Backend for `kind`.
    #[must_use]
    pub fn get(&self, kind: TorrentDownloaderType) -> Arc<dyn EngineBackend> {
        self.backends
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(UnavailableBackend::new(kind)))
    }
}
