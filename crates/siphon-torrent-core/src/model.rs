//! Value types shared by every acquisition backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAGNET_PREFIX: &[u8] = b"magnet:";
const BTIH_PREFIX: &str = "urn:btih:";

/// Backend-assigned torrent identity, typically a lowercase info-hash.
///
/// Only meaningful within the backend instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentHandle(String);

impl TorrentHandle {
    /// Wrap a backend identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TorrentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque torrent payload: either the bytes of a magnet URI or a `.torrent` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTorrentInfo {
    data: Vec<u8>,
}

impl EncodedTorrentInfo {
    /// Wrap raw bytes without inspecting them.
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Encode a magnet URI verbatim.
    #[must_use]
    pub fn from_magnet(uri: &str) -> Self {
        Self::new(uri.as_bytes().to_vec())
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the wrapper and return the payload.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Whether the payload is a magnet URI rather than metainfo bytes.
    #[must_use]
    pub fn is_magnet(&self) -> bool {
        self.data.starts_with(MAGNET_PREFIX)
    }

    /// The magnet URI when the payload is one.
    #[must_use]
    pub fn as_magnet(&self) -> Option<&str> {
        if !self.is_magnet() {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }

    /// Hex info-hash named by a magnet's `xt=urn:btih:` parameter, lowercased.
    ///
    /// Base32 hashes and non-magnet payloads yield `None`.
    #[must_use]
    pub fn info_hash_hint(&self) -> Option<String> {
        let magnet = self.as_magnet()?;
        let (_, query) = magnet.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(key, _)| *key == "xt")
            .filter_map(|(_, value)| value.strip_prefix(BTIH_PREFIX))
            .find(|hash| hash.len() == 40 && hash.bytes().all(|b| b.is_ascii_hexdigit()))
            .map(str::to_ascii_lowercase)
    }
}

/// Aggregate transfer counters for a whole downloader.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DownloaderStats {
    /// Combined size of the torrents this downloader is tracking.
    pub total_size: u64,
    /// Size-weighted completion of the tracked torrents in `[0, 1]`; zero
    /// when nothing is tracked.
    pub progress: f32,
    /// Bytes downloaded during this backend session.
    pub downloaded_bytes: u64,
    /// Bytes uploaded during this backend session.
    pub uploaded_bytes: u64,
    /// Current download rate in bytes/second.
    pub download_speed: u64,
    /// Current upload rate in bytes/second.
    pub upload_speed: u64,
    /// When the snapshot was taken; `None` until the first successful poll.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DownloaderStats {
    /// Fold per-torrent snapshots into `total_size` and `progress`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn with_sessions<'a>(
        mut self,
        sessions: impl IntoIterator<Item = &'a SessionStats>,
    ) -> Self {
        let mut total: u64 = 0;
        let mut done = 0.0_f64;
        for session in sessions {
            total = total.saturating_add(session.total_size);
            done += f64::from(clamp_progress(session.progress)) * session.total_size as f64;
        }
        self.total_size = total;
        self.progress = if total == 0 {
            0.0
        } else {
            clamp_progress((done / total as f64) as f32)
        };
        self
    }
}

/// Progress and transfer counters for a single torrent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Total size of the selected content.
    pub total_size: u64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: u64,
    /// Bytes uploaded so far.
    pub uploaded_bytes: u64,
    /// Current download rate in bytes/second.
    pub download_speed: u64,
    /// Current upload rate in bytes/second.
    pub upload_speed: u64,
    /// Completion fraction in `[0, 1]`; zero when the backend does not report it.
    pub progress: f32,
    /// Backend-reported state label, when available.
    pub state: Option<String>,
    /// When the snapshot was taken; `None` until the first successful poll.
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Completion as a percentage.
    #[must_use]
    pub fn percent_complete(&self) -> f32 {
        clamp_progress(self.progress) * 100.0
    }
}

/// Progress counters scoped to one file inside a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FileStats {
    /// File length in bytes.
    pub length: u64,
    /// Bytes of this file downloaded so far.
    pub downloaded_bytes: u64,
    /// Completion fraction in `[0, 1]`.
    pub progress: f32,
}

/// Clamp a backend-reported progress value into `[0, 1]`, mapping NaN to zero.
#[must_use]
pub fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Download priority applied to an individual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download the file.
    Skip,
    /// Low priority.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// High priority.
    High,
}

/// Identity of the library behind a downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentLibInfo {
    /// Vendor or product name.
    pub vendor: String,
    /// Supported version range.
    pub version: String,
    /// Whether files can be streamed while downloading.
    pub supports_streaming: bool,
}
