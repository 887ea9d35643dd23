//! Payload builders and settings for tests against a fake daemon.

use serde_json::{Value, json};
use siphon_config::{QBittorrentSettings, TorrentDownloaderConfig, TorrentDownloaderType};

/// Info-hash embedded in [`sample_magnet`].
pub const SAMPLE_HASH: &str = "0123456789abcdef0123456789abcdef01234567";

/// Magnet URI whose `xt` names [`SAMPLE_HASH`].
#[must_use]
pub fn sample_magnet() -> String {
    format!("magnet:?xt=urn:btih:{SAMPLE_HASH}&dn=demo")
}

/// qBittorrent settings pointing at `base_url` with test credentials.
#[must_use]
pub fn qbittorrent_settings(base_url: &str) -> QBittorrentSettings {
    QBittorrentSettings {
        url: base_url.to_string(),
        username: "admin".to_string(),
        password: "adminadmin".to_string(),
        save_dir: "/downloads".to_string(),
        verify_certificate: true,
    }
}

/// Downloader configuration selecting qBittorrent at `base_url`.
#[must_use]
pub fn qbittorrent_config(base_url: &str) -> TorrentDownloaderConfig {
    TorrentDownloaderConfig {
        downloader_type: TorrentDownloaderType::QBittorrent,
        qbittorrent: qbittorrent_settings(base_url),
        ..TorrentDownloaderConfig::default()
    }
}

/// One `torrents/info` row.
#[must_use]
pub fn torrent_json(hash: &str, name: &str, size: i64) -> Value {
    json!({
        "hash": hash,
        "name": name,
        "size": size,
        "progress": 0.25,
        "dlspeed": 1_024,
        "upspeed": 256,
        "downloaded": size / 4,
        "uploaded": 0,
        "state": "downloading",
        "save_path": "/downloads",
    })
}

/// One `torrents/files` row.
#[must_use]
pub fn file_json(index: u32, name: &str, size: u64, progress: f32) -> Value {
    json!({
        "index": index,
        "name": name,
        "size": size,
        "progress": progress,
        "priority": 1,
    })
}

/// `transfer/info` body.
#[must_use]
pub fn transfer_json(dl_speed: u64, dl_data: u64, up_speed: u64, up_data: u64) -> Value {
    json!({
        "dl_info_speed": dl_speed,
        "dl_info_data": dl_data,
        "up_info_speed": up_speed,
        "up_info_data": up_data,
    })
}
