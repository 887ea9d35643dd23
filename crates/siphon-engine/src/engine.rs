//! Configuration-driven owner of one backend downloader.
//!
//! # Design
//! - A single task consumes the configuration and peer-filter streams; the
//!   first configuration value creates the downloader and flips the state to `Ready`.
//! - The downloader slot is guarded by an `RwLock`; creation and restart hold
//!   the write lock across close-then-create so two instances never coexist.
//! - Later configuration changes go through the backend's `apply_config` hook;
//!   backends that cannot reconfigure in place need an explicit `restart`.

use std::sync::Arc;

use siphon_config::{ConfigWatcher, PeerFilterSettings, TorrentDownloaderConfig};
use siphon_torrent_core::TorrentDownloader;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::EngineBackend;
use crate::error::{EngineError, EngineResult};

/// Lifecycle states of a [`TorrentEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No downloader has been created yet.
    Uninitialized,
    /// A downloader is live.
    Ready,
    /// A configuration change is being applied.
    Reconfiguring,
    /// The engine has shut down.
    Closed,
}

struct EngineInner {
    backend: Arc<dyn EngineBackend>,
    state: watch::Sender<EngineState>,
    downloader: RwLock<Option<Arc<dyn TorrentDownloader>>>,
    config: RwLock<TorrentDownloaderConfig>,
    peer_filter: RwLock<Option<PeerFilterSettings>>,
    shutdown: CancellationToken,
}

impl EngineInner {
    fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    async fn handle_config(&self, next: TorrentDownloaderConfig) {
        let previous = std::mem::replace(&mut *self.config.write().await, next.clone());
        match self.state() {
            EngineState::Uninitialized => self.initialize(&next).await,
            EngineState::Ready => {
                if !self.backend.settings_changed(&previous, &next) {
                    debug!(backend = %self.backend.kind(), "configuration unchanged for backend");
                    return;
                }
                self.state.send_replace(EngineState::Reconfiguring);
                let live = self.downloader.read().await.clone();
                if let Some(downloader) = live {
                    self.backend.apply_config(&downloader, &next).await;
                }
                self.state.send_replace(EngineState::Ready);
            }
            EngineState::Reconfiguring | EngineState::Closed => {}
        }
    }

    async fn initialize(&self, config: &TorrentDownloaderConfig) {
        let mut slot = self.downloader.write().await;
        if slot.is_some() {
            return;
        }
        match self.backend.new_instance(config).await {
            Ok(downloader) => {
                self.apply_stored_filter(&downloader).await;
                *slot = Some(downloader);
                drop(slot);
                self.state.send_replace(EngineState::Ready);
                info!(backend = %self.backend.kind(), "torrent engine initialized");
            }
            Err(err) => warn!(
                backend = %self.backend.kind(),
                error = %err,
                "failed to create downloader; waiting for the next configuration"
            ),
        }
    }

    async fn handle_peer_filter(&self, filter: PeerFilterSettings) {
        *self.peer_filter.write().await = Some(filter.clone());
        let live = self.downloader.read().await.clone();
        if let Some(downloader) = live {
            self.backend.apply_peer_filter(&downloader, &filter).await;
        }
    }

    async fn apply_stored_filter(&self, downloader: &Arc<dyn TorrentDownloader>) {
        let stored = self.peer_filter.read().await.clone();
        if let Some(filter) = stored {
            self.backend.apply_peer_filter(downloader, &filter).await;
        }
    }
}

/// Owns the live downloader for one backend and keeps it in step with configuration.
pub struct TorrentEngine {
    inner: Arc<EngineInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TorrentEngine {
    /// Start consuming `config` and `peer_filter`.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(
        backend: Arc<dyn EngineBackend>,
        mut config: ConfigWatcher<TorrentDownloaderConfig>,
        mut peer_filter: ConfigWatcher<PeerFilterSettings>,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        let inner = Arc::new(EngineInner {
            backend,
            state,
            downloader: RwLock::new(None),
            config: RwLock::new(config.current()),
            peer_filter: RwLock::new(None),
            shutdown: CancellationToken::new(),
        });

        let worker = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            let mut filters_open = true;
            loop {
                tokio::select! {
                    () = worker.shutdown.cancelled() => break,
                    next = config.next() => match next {
                        Ok(snapshot) => worker.handle_config(snapshot).await,
                        Err(err) => {
                            warn!(error = %err, "configuration watcher terminated");
                            break;
                        }
                    },
                    next = peer_filter.next(), if filters_open => match next {
                        Ok(filter) => worker.handle_peer_filter(filter).await,
                        Err(err) => {
                            debug!(error = %err, "peer filter watcher terminated");
                            filters_open = false;
                        }
                    },
                }
            }
        });

        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.inner.state()
    }

    /// Subscribe to lifecycle state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    /// Wait until the first downloader has been created.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` when the engine closes first.
    pub async fn wait_initialized(&self) -> EngineResult<()> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|state| *state != EngineState::Uninitialized)
            .await
            .map_err(|_| EngineError::Closed)?;
        if state == EngineState::Closed {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    /// Live downloader, waiting for initialization first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` when the engine is closed.
    pub async fn downloader(&self) -> EngineResult<Arc<dyn TorrentDownloader>> {
        self.wait_initialized().await?;
        self.inner
            .downloader
            .read()
            .await
            .clone()
            .ok_or(EngineError::NotInitialized)
    }

    /// Live downloader if one exists right now.
    pub async fn current_downloader(&self) -> Option<Arc<dyn TorrentDownloader>> {
        self.inner.downloader.read().await.clone()
    }

    /// Probe connectivity with the latest configuration using a throwaway client.
    pub async fn test_connection(&self) -> bool {
        let config = self.inner.config.read().await.clone();
        self.inner.backend.test_connection(&config).await
    }

    /// Close the live downloader and create a new one from the latest configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` after close, or the backend's creation error;
    /// on failure the engine returns to `Uninitialized`.
    pub async fn restart(&self) -> EngineResult<()> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(EngineError::Closed);
        }
        let config = inner.config.read().await.clone();
        let mut slot = inner.downloader.write().await;
        if inner.state() == EngineState::Ready {
            inner.state.send_replace(EngineState::Reconfiguring);
        }
        if let Some(previous) = slot.take() {
            previous.close().await;
        }
        match inner.backend.new_instance(&config).await {
            Ok(downloader) => {
                inner.apply_stored_filter(&downloader).await;
                *slot = Some(downloader);
                drop(slot);
                inner.state.send_replace(EngineState::Ready);
                info!(backend = %inner.backend.kind(), "torrent engine restarted");
                Ok(())
            }
            Err(err) => {
                drop(slot);
                inner.state.send_replace(EngineState::Uninitialized);
                warn!(backend = %inner.backend.kind(), error = %err, "torrent engine restart failed");
                Err(err)
            }
        }
    }

    /// Stop consuming configuration and close the live downloader.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(error = %err, "engine task ended abnormally");
        }
        let live = self.inner.downloader.write().await.take();
        if let Some(downloader) = live {
            downloader.close().await;
        }
        if self.inner.state.send_replace(EngineState::Closed) != EngineState::Closed {
            info!(backend = %self.inner.backend.kind(), "torrent engine closed");
        }
    }
}
