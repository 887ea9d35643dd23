//! Default endpoints and probe parameters for fresh configurations.
//!
//! # Design
//! - Keep every factory default in one place so file loading and `Default` agree.

/// Default qBittorrent Web UI address.
pub(crate) const QBITTORRENT_URL: &str = "http://localhost:8080";
/// Default qBittorrent Web UI user.
pub(crate) const QBITTORRENT_USERNAME: &str = "admin";
/// Default Aria2 JSON-RPC endpoint.
pub(crate) const ARIA2_URL: &str = "http://localhost:6800/jsonrpc";
/// Default Transmission RPC endpoint.
pub(crate) const TRANSMISSION_URL: &str = "http://localhost:9091/transmission/rpc";
/// Default argument template for the command-line backend.
pub(crate) const COMMAND_LINE_ARGS: &str = "--save-dir={saveDir} {magnetLink}";
/// Default per-probe deadline in milliseconds.
pub(crate) const SPEED_TEST_TIMEOUT_MS: u64 = 5_000;
/// Default number of bytes requested per probe.
pub(crate) const SPEED_TEST_SEGMENT_SIZE: u64 = 512 * 1024;
