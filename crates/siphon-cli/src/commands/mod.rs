//! Command handlers grouped by concern.

pub(crate) mod config;
pub(crate) mod connection;
pub(crate) mod download;
pub(crate) mod probe;
pub(crate) mod torrents;
