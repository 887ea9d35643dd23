//! Wire DTOs for the qBittorrent Web API.

use serde::{Deserialize, Serialize};
use siphon_torrent_core::{FilePriority, FileStats, SessionStats, clamp_progress};

/// Acknowledgement body returned by `torrents/add` on success.
pub(crate) const ADD_ACCEPTED: &str = "Ok.";

/// Row of `GET /api/v2/torrents/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info-hash.
    pub hash: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Selected size in bytes; negative while metadata is unknown.
    #[serde(default)]
    pub size: i64,
    /// Completion fraction.
    #[serde(default)]
    pub progress: f32,
    /// Download rate in bytes/second.
    #[serde(default)]
    pub dlspeed: u64,
    /// Upload rate in bytes/second.
    #[serde(default)]
    pub upspeed: u64,
    /// Bytes downloaded.
    #[serde(default)]
    pub downloaded: u64,
    /// Bytes uploaded.
    #[serde(default)]
    pub uploaded: u64,
    /// Daemon state label.
    #[serde(default)]
    pub state: String,
    /// Directory the daemon writes to.
    #[serde(default)]
    pub save_path: String,
}

impl TorrentInfo {
    /// Size clamped to zero while the daemon reports it as unknown.
    #[must_use]
    pub fn known_size(&self) -> u64 {
        u64::try_from(self.size).unwrap_or(0)
    }

    /// Project onto the backend-neutral stats snapshot.
    #[must_use]
    pub fn to_session_stats(&self) -> SessionStats {
        SessionStats {
            total_size: self.known_size(),
            downloaded_bytes: self.downloaded,
            uploaded_bytes: self.uploaded,
            download_speed: self.dlspeed,
            upload_speed: self.upspeed,
            progress: clamp_progress(self.progress),
            state: (!self.state.is_empty()).then(|| self.state.clone()),
            updated_at: Some(chrono::Utc::now()),
        }
    }
}

/// Row of `GET /api/v2/torrents/files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFileInfo {
    /// File index; older daemons omit it and rely on array position.
    #[serde(default)]
    pub index: Option<u32>,
    /// Path relative to the save directory.
    pub name: String,
    /// File length in bytes.
    #[serde(default)]
    pub size: u64,
    /// Completion fraction.
    #[serde(default)]
    pub progress: f32,
    /// Daemon priority value.
    #[serde(default = "default_wire_priority")]
    pub priority: u8,
}

impl TorrentFileInfo {
    /// Per-file stats snapshot.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn to_file_stats(&self) -> FileStats {
        let progress = clamp_progress(self.progress);
        FileStats {
            length: self.size,
            downloaded_bytes: (self.size as f64 * f64::from(progress)).round() as u64,
            progress,
        }
    }
}

const fn default_wire_priority() -> u8 {
    1
}

/// Body of `GET /api/v2/transfer/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferInfo {
    /// Global download rate.
    #[serde(default)]
    pub dl_info_speed: u64,
    /// Bytes downloaded this daemon session.
    #[serde(default)]
    pub dl_info_data: u64,
    /// Global upload rate.
    #[serde(default)]
    pub up_info_speed: u64,
    /// Bytes uploaded this daemon session.
    #[serde(default)]
    pub up_info_data: u64,
}

/// Outcome of a torrent submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTorrentResponse {
    /// The daemon answered with its acknowledgement string.
    Accepted,
    /// The daemon answered with anything else.
    Rejected {
        /// Body returned instead of the acknowledgement.
        body: String,
    },
}

impl AddTorrentResponse {
    pub(crate) fn from_body(body: &str) -> Self {
        if body.trim() == ADD_ACCEPTED {
            Self::Accepted
        } else {
            Self::Rejected {
                body: body.to_string(),
            }
        }
    }

    /// Whether the submission was acknowledged.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// State filter accepted by `torrents/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentFilter {
    /// Every torrent.
    All,
    /// Downloading torrents.
    Downloading,
    /// Seeding torrents.
    Seeding,
    /// Completed torrents.
    Completed,
    /// Paused torrents.
    Paused,
    /// Torrents with transfer activity.
    Active,
    /// Torrents without transfer activity.
    Inactive,
    /// Stalled torrents.
    Stalled,
    /// Torrents in an error state.
    Errored,
}

impl TorrentFilter {
    /// Query value understood by the daemon.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Stalled => "stalled",
            Self::Errored => "errored",
        }
    }
}

/// Map a daemon priority value onto the neutral priority enum.
#[must_use]
pub const fn priority_from_wire(value: u8) -> FilePriority {
    match value {
        0 => FilePriority::Skip,
        1 => FilePriority::Normal,
        6 | 7 => FilePriority::High,
        _ => FilePriority::Low,
    }
}

/// Map a neutral priority onto the daemon's accepted values (0, 1, 6, 7).
#[must_use]
pub const fn priority_to_wire(priority: FilePriority) -> u8 {
    match priority {
        FilePriority::Skip => 0,
        FilePriority::Low | FilePriority::Normal => 1,
        FilePriority::High => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_info_tolerates_unknown_size_and_missing_fields() -> anyhow::Result<()> {
        let info: TorrentInfo = serde_json::from_str(
            r#"{"hash":"abc","name":"demo","size":-1,"progress":1.2,"state":"metaDL"}"#,
        )?;
        assert_eq!(info.known_size(), 0);
        let stats = info.to_session_stats();
        assert!((stats.progress - 1.0).abs() < f32::EPSILON);
        assert_eq!(stats.state.as_deref(), Some("metaDL"));
        assert!(stats.updated_at.is_some());
        Ok(())
    }

    #[test]
    fn add_acknowledgement_is_exact() {
        assert!(AddTorrentResponse::from_body("Ok.").is_accepted());
        assert!(AddTorrentResponse::from_body("Ok.\n").is_accepted());
        assert_eq!(
            AddTorrentResponse::from_body("Fails."),
            AddTorrentResponse::Rejected {
                body: "Fails.".into()
            }
        );
    }

    #[test]
    fn wire_priorities_map_to_neutral_levels() {
        assert_eq!(priority_from_wire(0), FilePriority::Skip);
        assert_eq!(priority_from_wire(1), FilePriority::Normal);
        assert_eq!(priority_from_wire(6), FilePriority::High);
        assert_eq!(priority_from_wire(7), FilePriority::High);
        assert_eq!(priority_from_wire(4), FilePriority::Low);
        assert_eq!(priority_to_wire(FilePriority::High), 7);
        assert_eq!(priority_to_wire(FilePriority::Skip), 0);
    }

    #[test]
    fn file_stats_derive_downloaded_bytes() {
        let file = TorrentFileInfo {
            index: Some(0),
            name: "demo/ep1.mkv".into(),
            size: 1_000,
            progress: 0.5,
            priority: 1,
        };
        let stats = file.to_file_stats();
        assert_eq!(stats.downloaded_bytes, 500);
        assert_eq!(stats.length, 1_000);
    }
}
