//! File and environment configuration loading.
//!
//! # Design
//! - A JSON document provides the base; missing fields fall back to defaults.
//! - `SIPHON_*` environment variables override the qBittorrent record and backend type.
//! - Environment lookup is injected so overrides can be exercised without touching the process env.

use std::env;
use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, TorrentDownloaderType};

const ENV_DOWNLOADER_TYPE: &str = "SIPHON_DOWNLOADER_TYPE";
const ENV_QBITTORRENT_URL: &str = "SIPHON_QBITTORRENT_URL";
const ENV_QBITTORRENT_USERNAME: &str = "SIPHON_QBITTORRENT_USERNAME";
const ENV_QBITTORRENT_PASSWORD: &str = "SIPHON_QBITTORRENT_PASSWORD";
const ENV_QBITTORRENT_SAVE_DIR: &str = "SIPHON_QBITTORRENT_SAVE_DIR";
const ENV_QBITTORRENT_VERIFY: &str = "SIPHON_QBITTORRENT_VERIFY_CERTIFICATE";

/// Load configuration from an optional JSON file and the process environment.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when an
/// environment override holds an invalid value.
pub async fn load_config(path: Option<&Path>) -> ConfigResult<AppConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            parse_config(&raw).map_err(|err| match err {
                ConfigError::Parse { source, .. } => ConfigError::Parse {
                    path: Some(path.to_path_buf()),
                    source,
                },
                other => other,
            })?
        }
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    Ok(config)
}

/// Parse a JSON configuration document.
///
/// # Errors
///
/// Returns `ConfigError::Parse` when the document is malformed.
pub fn parse_config(raw: &str) -> ConfigResult<AppConfig> {
    serde_json::from_str(raw).map_err(|source| ConfigError::Parse { path: None, source })
}

/// Apply `SIPHON_*` overrides resolved through `lookup`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnv` for unknown backend types or non-boolean flags.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_DOWNLOADER_TYPE) {
        config.downloader.downloader_type = value
            .parse::<TorrentDownloaderType>()
            .map_err(|value| ConfigError::InvalidEnv {
                key: ENV_DOWNLOADER_TYPE,
                value,
            })?;
        debug!(key = ENV_DOWNLOADER_TYPE, "applied environment override");
    }

    let qbittorrent = &mut config.downloader.qbittorrent;
    for (key, slot) in [
        (ENV_QBITTORRENT_URL, &mut qbittorrent.url),
        (ENV_QBITTORRENT_USERNAME, &mut qbittorrent.username),
        (ENV_QBITTORRENT_PASSWORD, &mut qbittorrent.password),
        (ENV_QBITTORRENT_SAVE_DIR, &mut qbittorrent.save_dir),
    ] {
        if let Some(value) = lookup(key) {
            *slot = value;
            debug!(key, "applied environment override");
        }
    }

    if let Some(value) = lookup(ENV_QBITTORRENT_VERIFY) {
        qbittorrent.verify_certificate = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
            key: ENV_QBITTORRENT_VERIFY,
            value,
        })?;
    }

    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
