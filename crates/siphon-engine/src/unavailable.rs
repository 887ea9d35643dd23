//! Placeholder backend for kinds this build cannot drive.

use std::sync::Arc;

use async_trait::async_trait;
use siphon_config::{PeerFilterSettings, TorrentDownloaderConfig, TorrentDownloaderType};
use siphon_torrent_core::TorrentDownloader;
use tracing::{info, warn};

use crate::backend::{BackendCapabilities, EngineBackend};
use crate::error::{EngineError, EngineResult};

/// Backend whose every operation is an explicit, logged no-op.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableBackend {
    kind: TorrentDownloaderType,
}

impl UnavailableBackend {
    /// Placeholder for `kind`.
    #[must_use]
    pub const fn new(kind: TorrentDownloaderType) -> Self {
        Self { kind }
    }

    const fn reason(self) -> &'static str {
        match self.kind {
            TorrentDownloaderType::Embedded => "embedded engine must be registered by the host",
            _ => "backend is not implemented in this build",
        }
    }
}

#[async_trait]
impl EngineBackend for UnavailableBackend {
    fn kind(&self) -> TorrentDownloaderType {
        self.kind
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn settings_changed(
        &self,
        previous: &TorrentDownloaderConfig,
        next: &TorrentDownloaderConfig,
    ) -> bool {
        previous.active() != next.active()
    }

    async fn new_instance(
        &self,
        _config: &TorrentDownloaderConfig,
    ) -> EngineResult<Arc<dyn TorrentDownloader>> {
        warn!(backend = %self.kind, reason = self.reason(), "cannot create downloader");
        Err(EngineError::BackendUnavailable { kind: self.kind })
    }

    async fn test_connection(&self, _config: &TorrentDownloaderConfig) -> bool {
        info!(backend = %self.kind, reason = self.reason(), "connection test skipped");
        false
    }

    async fn apply_config(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        _config: &TorrentDownloaderConfig,
    ) {
        info!(backend = %self.kind, "configuration change ignored");
    }

    async fn apply_peer_filter(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        _filter: &PeerFilterSettings,
    ) {
        info!(backend = %self.kind, "peer filtering not supported");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_operation_degrades_without_error_except_creation() {
        let backend = UnavailableBackend::new(TorrentDownloaderType::Aria2);
        let config = TorrentDownloaderConfig::default();
        assert!(!backend.test_connection(&config).await);
        assert!(matches!(
            backend.new_instance(&config).await,
            Err(EngineError::BackendUnavailable {
                kind: TorrentDownloaderType::Aria2
            })
        ));
        assert!(!backend.is_supported());
    }
}
