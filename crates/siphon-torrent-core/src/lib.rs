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

//! Backend-neutral torrent acquisition contracts and value types.
//!
//! Layout:
//! - `model.rs`: handles, encoded torrent blobs, stats snapshots, priorities
//! - `service.rs`: downloader/session/file traits implemented by each backend
//! - `error.rs`: shared error taxonomy

pub mod error;
pub mod model;
pub mod service;

pub use error::{BoxError, TorrentError, TorrentResult};
pub use model::{
    DownloaderStats, EncodedTorrentInfo, FilePriority, FileStats, SessionStats, TorrentHandle,
    TorrentLibInfo, clamp_progress,
};
pub use service::{
    HttpFileDownloader, TorrentDownloader, TorrentFileEntry, TorrentFileHandle, TorrentSession,
};
