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

//! Engine lifecycle: turns a stream of configuration values into exactly one
//! live downloader for the selected backend.
//!
//! Layout:
//! - `backend.rs`: backend contract, capabilities and the per-kind registry
//! - `qbittorrent.rs`: qBittorrent backend
//! - `unavailable.rs`: placeholder backend for kinds without an implementation
//! - `engine.rs`: configuration-driven state machine owning the downloader
//! - `supervisor.rs`: swaps engines when the selected backend kind changes

pub mod backend;
pub mod engine;
pub mod error;
pub mod qbittorrent;
pub mod supervisor;
pub mod unavailable;

pub use backend::{BackendCapabilities, BackendRegistry, EngineBackend};
pub use engine::{EngineState, TorrentEngine};
pub use error::{EngineError, EngineResult};
pub use qbittorrent::QBittorrentBackend;
pub use supervisor::EngineSupervisor;
pub use unavailable::UnavailableBackend;
