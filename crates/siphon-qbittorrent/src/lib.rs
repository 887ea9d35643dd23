#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! qBittorrent Web API v2 backend.
//!
//! Layout:
//! - `client.rs`: authenticated REST client with fail-soft list/control calls
//! - `types.rs`: wire DTOs and priority mapping
//! - `downloader.rs`: downloader with aggregate stats polling and handle discovery
//! - `session.rs`: per-torrent session with cached identity and stats polling
//! - `file.rs`: file entry and handle adapters
//! - `poller.rs`: cancellable interval task shared by downloader and sessions
//! - `fetch.rs`: reqwest-backed `.torrent` file downloader

pub mod client;
mod discovery;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod file;
mod poller;
pub mod session;
pub mod types;

pub use client::QBittorrentClient;
pub use downloader::{DownloaderOptions, QBittorrentDownloader};
pub use error::{QbError, QbResult};
pub use fetch::ReqwestFileDownloader;
pub use file::{QBittorrentFileEntry, QBittorrentFileHandle};
pub use session::QBittorrentSession;
pub use types::{AddTorrentResponse, TorrentFileInfo, TorrentFilter, TorrentInfo, TransferInfo};
