#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (payload builders and settings), mocks.rs (fake qBittorrent daemon).

pub mod fixtures;
pub mod mocks;
