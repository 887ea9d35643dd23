//! Keeps one engine running for the currently selected backend kind.
//!
//! # Design
//! - Watches the downloader section and reacts only to a change of backend kind;
//!   settings changes within a kind are the running engine's concern.
//! - The outgoing engine is closed before the replacement starts, so at most one
//!   downloader is live across a swap.

use std::sync::Arc;

use siphon_config::{ConfigService, TorrentDownloaderType};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::BackendRegistry;
use crate::engine::TorrentEngine;
use crate::error::{EngineError, EngineResult};

/// Starts, swaps and stops engines as the selected backend kind changes.
pub struct EngineSupervisor {
    active: watch::Receiver<Option<Arc<TorrentEngine>>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EngineSupervisor {
    /// Begin supervising engines for `config`.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(registry: BackendRegistry, config: Arc<ConfigService>) -> Self {
        let (tx, rx) = watch::channel(None::<Arc<TorrentEngine>>);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut downloader = config.watch_downloader();
            let mut current: Option<TorrentDownloaderType> = None;
            loop {
                let next = tokio::select! {
                    () = token.cancelled() => break,
                    next = downloader.next() => next,
                };
                let kind = match next {
                    Ok(section) => section.downloader_type,
                    Err(err) => {
                        warn!(error = %err, "downloader configuration stream ended");
                        break;
                    }
                };
                if current == Some(kind) {
                    continue;
                }

                let previous = tx.send_replace(None);
                if let Some(previous) = previous {
                    previous.close().await;
                }

                let backend = registry.get(kind);
                if !backend.is_supported() {
                    warn!(backend = %kind, "selected backend is not available in this build");
                }
                let engine = TorrentEngine::start(
                    backend,
                    config.watch_downloader(),
                    config.watch_peer_filter(),
                );
                info!(backend = %kind, "engine started for selected backend");
                tx.send_replace(Some(Arc::new(engine)));
                current = Some(kind);
            }

            let last = tx.send_replace(None);
            if let Some(last) = last {
                last.close().await;
            }
        });

        Self {
            active: rx,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Engine for the selected backend, if one is running.
    #[must_use]
    pub fn active_engine(&self) -> Option<Arc<TorrentEngine>> {
        self.active.borrow().clone()
    }

    /// Wait until an engine is running.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Closed` once the supervisor has stopped.
    pub async fn wait_engine(&self) -> EngineResult<Arc<TorrentEngine>> {
        let mut rx = self.active.clone();
        let engine = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| EngineError::Closed)?
            .clone();
        engine.ok_or(EngineError::Closed)
    }

    /// Stop supervising and close the running engine.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(error = %err, "engine supervisor task ended abnormally");
        }
    }
}
