//! In-process configuration service backed by a `watch` channel.
//!
//! # Design
//! - A single `watch::Sender` holds the authoritative `AppConfig`; each update replaces it whole.
//! - Watchers project the root value onto one section and only yield when that section changes.
//! - The first `next()` yields the current value so consumers need no separate bootstrap read.

use tokio::sync::watch;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, PeerFilterSettings, SpeedTestSettings, TorrentDownloaderConfig};

/// Owner of the live configuration value.
#[derive(Debug)]
pub struct ConfigService {
    tx: watch::Sender<AppConfig>,
}

impl ConfigService {
    /// Create a service seeded with `initial`.
    #[must_use]
    pub fn new(initial: AppConfig) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Current configuration.
    #[must_use]
    pub fn snapshot(&self) -> AppConfig {
        self.tx.borrow().clone()
    }

    /// Replace the whole configuration.
    pub fn replace(&self, config: AppConfig) {
        self.tx.send_replace(config);
        debug!("configuration replaced");
    }

    /// Edit the configuration in place; watchers are woken only if it changed.
    pub fn update<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut AppConfig),
    {
        let changed = self.tx.send_if_modified(|config| {
            let before = config.clone();
            edit(config);
            *config != before
        });
        if changed {
            debug!("configuration updated");
        }
        changed
    }

    /// Stream of the downloader section.
    #[must_use]
    pub fn watch_downloader(&self) -> ConfigWatcher<TorrentDownloaderConfig> {
        ConfigWatcher::new(self.tx.subscribe(), |config| config.downloader.clone())
    }

    /// Stream of the peer filter section.
    #[must_use]
    pub fn watch_peer_filter(&self) -> ConfigWatcher<PeerFilterSettings> {
        ConfigWatcher::new(self.tx.subscribe(), |config| config.peer_filter.clone())
    }

    /// Stream of the speed test section.
    #[must_use]
    pub fn watch_speed_test(&self) -> ConfigWatcher<SpeedTestSettings> {
        ConfigWatcher::new(self.tx.subscribe(), |config| config.speed_test.clone())
    }
}

/// Deduplicating stream over one projection of the configuration.
#[derive(Debug)]
pub struct ConfigWatcher<T> {
    rx: watch::Receiver<AppConfig>,
    project: fn(&AppConfig) -> T,
    last: Option<T>,
}

impl<T: Clone + PartialEq> ConfigWatcher<T> {
    /// Build a watcher over an existing receiver.
    #[must_use]
    pub const fn new(rx: watch::Receiver<AppConfig>, project: fn(&AppConfig) -> T) -> Self {
        Self {
            rx,
            project,
            last: None,
        }
    }

    /// Current projected value without waiting.
    #[must_use]
    pub fn current(&self) -> T {
        (self.project)(&self.rx.borrow())
    }

    /// Wait for the next distinct projected value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::WatchClosed` once the service is dropped and the
    /// latest value has already been observed.
    pub async fn next(&mut self) -> ConfigResult<T> {
        loop {
            let value = {
                let config = self.rx.borrow_and_update();
                (self.project)(&config)
            };
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Ok(value);
            }
            self.rx
                .changed()
                .await
                .map_err(|_| ConfigError::WatchClosed)?;
        }
    }
}
