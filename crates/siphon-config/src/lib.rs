#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Configuration model, loading and change propagation for siphon.
//!
//! Layout:
//! - `model.rs`: backend selection, per-backend settings, peer filter, speed test
//! - `loader.rs`: JSON file loading with `SIPHON_*` environment overrides
//! - `watch.rs`: watch-channel service and projected configuration streams
//! - `error.rs`: configuration errors

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod watch;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load_config, parse_config};
pub use model::{
    ActiveBackend, AppConfig, Aria2Settings, CommandLineSettings, EmbeddedSettings,
    PeerFilterSettings, QBittorrentSettings, SpeedTestSettings, TorrentDownloaderConfig,
    TorrentDownloaderType, TransmissionSettings,
};
pub use watch::{ConfigService, ConfigWatcher};
