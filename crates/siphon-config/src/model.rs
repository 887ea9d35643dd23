//! Typed configuration models consumed by the engine and the speed prober.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

const REDACTED: &str = "***";

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Torrent backend selection and per-backend settings.
    pub downloader: TorrentDownloaderConfig,
    /// Peer filter policy forwarded to backends that support it.
    pub peer_filter: PeerFilterSettings,
    /// Source speed probing parameters.
    pub speed_test: SpeedTestSettings,
}

impl AppConfig {
    /// Copy with every credential replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            downloader: self.downloader.redacted(),
            ..self.clone()
        }
    }
}

/// Backend kinds a downloader can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentDownloaderType {
    /// Embedded engine supplied by the host application.
    #[default]
    Embedded,
    /// qBittorrent Web API v2.
    #[serde(rename = "qbittorrent")]
    QBittorrent,
    /// Aria2 JSON-RPC.
    Aria2,
    /// Transmission RPC.
    Transmission,
    /// Local executable driven through an argument template.
    CommandLine,
}

impl TorrentDownloaderType {
    /// Every backend kind, in display order.
    pub const ALL: [Self; 5] = [
        Self::Embedded,
        Self::QBittorrent,
        Self::Aria2,
        Self::Transmission,
        Self::CommandLine,
    ];

    /// Stable identifier used in configuration files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::QBittorrent => "qbittorrent",
            Self::Aria2 => "aria2",
            Self::Transmission => "transmission",
            Self::CommandLine => "command_line",
        }
    }
}

impl fmt::Display for TorrentDownloaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TorrentDownloaderType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| value.to_string())
    }
}

/// Backend selection plus one retained settings record per backend kind.
///
/// Only the record matching `downloader_type` is active; the others keep the
/// user's inputs for when the selection changes back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentDownloaderConfig {
    /// Selected backend.
    #[serde(rename = "type")]
    pub downloader_type: TorrentDownloaderType,
    /// Embedded engine settings.
    pub embedded: EmbeddedSettings,
    /// qBittorrent settings.
    pub qbittorrent: QBittorrentSettings,
    /// Aria2 settings.
    pub aria2: Aria2Settings,
    /// Transmission settings.
    pub transmission: TransmissionSettings,
    /// Command-line backend settings.
    pub command_line: CommandLineSettings,
}

/// Borrow of the settings record selected by [`TorrentDownloaderConfig::downloader_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend<'a> {
    /// Embedded engine.
    Embedded(&'a EmbeddedSettings),
    /// qBittorrent.
    QBittorrent(&'a QBittorrentSettings),
    /// Aria2.
    Aria2(&'a Aria2Settings),
    /// Transmission.
    Transmission(&'a TransmissionSettings),
    /// Command-line tool.
    CommandLine(&'a CommandLineSettings),
}

impl ActiveBackend<'_> {
    /// Save directory configured on the active record.
    #[must_use]
    pub fn save_dir(&self) -> &str {
        match self {
            Self::Embedded(settings) => &settings.save_dir,
            Self::QBittorrent(settings) => &settings.save_dir,
            Self::Aria2(settings) => &settings.save_dir,
            Self::Transmission(settings) => &settings.save_dir,
            Self::CommandLine(settings) => &settings.save_dir,
        }
    }
}

impl TorrentDownloaderConfig {
    /// The settings record for the selected backend.
    #[must_use]
    pub const fn active(&self) -> ActiveBackend<'_> {
        match self.downloader_type {
            TorrentDownloaderType::Embedded => ActiveBackend::Embedded(&self.embedded),
            TorrentDownloaderType::QBittorrent => ActiveBackend::QBittorrent(&self.qbittorrent),
            TorrentDownloaderType::Aria2 => ActiveBackend::Aria2(&self.aria2),
            TorrentDownloaderType::Transmission => ActiveBackend::Transmission(&self.transmission),
            TorrentDownloaderType::CommandLine => ActiveBackend::CommandLine(&self.command_line),
        }
    }

    /// Copy with passwords and secrets replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        redact(&mut copy.qbittorrent.password);
        redact(&mut copy.aria2.secret);
        redact(&mut copy.transmission.password);
        copy
    }
}

fn redact(value: &mut String) {
    if !value.is_empty() {
        REDACTED.clone_into(value);
    }
}

/// Settings for the host-provided embedded engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedSettings {
    /// Directory downloads are written to.
    pub save_dir: String,
}

/// qBittorrent Web API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QBittorrentSettings {
    /// Base URL of the Web UI.
    pub url: String,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Save path passed on submission; empty lets the daemon choose.
    pub save_dir: String,
    /// Verify TLS certificates presented by the daemon.
    pub verify_certificate: bool,
}

impl Default for QBittorrentSettings {
    fn default() -> Self {
        Self {
            url: defaults::QBITTORRENT_URL.to_string(),
            username: defaults::QBITTORRENT_USERNAME.to_string(),
            password: String::new(),
            save_dir: String::new(),
            verify_certificate: true,
        }
    }
}

/// Aria2 JSON-RPC connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2Settings {
    /// JSON-RPC endpoint.
    pub url: String,
    /// RPC secret token.
    pub secret: String,
    /// Download directory.
    pub save_dir: String,
    /// Verify TLS certificates.
    pub verify_certificate: bool,
}

impl Default for Aria2Settings {
    fn default() -> Self {
        Self {
            url: defaults::ARIA2_URL.to_string(),
            secret: String::new(),
            save_dir: String::new(),
            verify_certificate: true,
        }
    }
}

/// Transmission RPC connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionSettings {
    /// RPC endpoint.
    pub url: String,
    /// RPC user.
    pub username: String,
    /// RPC password.
    pub password: String,
    /// Download directory.
    pub save_dir: String,
    /// Verify TLS certificates.
    pub verify_certificate: bool,
}

impl Default for TransmissionSettings {
    fn default() -> Self {
        Self {
            url: defaults::TRANSMISSION_URL.to_string(),
            username: String::new(),
            password: String::new(),
            save_dir: String::new(),
            verify_certificate: true,
        }
    }
}

/// Local executable backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandLineSettings {
    /// Executable path.
    pub executable: String,
    /// Argument template with `{magnetLink}`, `{torrentFile}` and `{saveDir}` placeholders.
    pub args: String,
    /// Download directory substituted for `{saveDir}`.
    pub save_dir: String,
}

impl Default for CommandLineSettings {
    fn default() -> Self {
        Self {
            executable: String::new(),
            args: defaults::COMMAND_LINE_ARGS.to_string(),
            save_dir: String::new(),
        }
    }
}

impl CommandLineSettings {
    /// Expand the argument template into an argv list.
    ///
    /// The template is split on whitespace before substitution so substituted
    /// values containing spaces stay a single argument. Arguments that expand
    /// to nothing are dropped.
    #[must_use]
    pub fn render_args(&self, magnet_link: &str, torrent_file: &str) -> Vec<String> {
        self.args
            .split_whitespace()
            .map(|token| {
                token
                    .replace("{magnetLink}", magnet_link)
                    .replace("{torrentFile}", torrent_file)
                    .replace("{saveDir}", &self.save_dir)
            })
            .filter(|arg| !arg.is_empty())
            .collect()
    }
}

/// Peer filtering policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerFilterSettings {
    /// Whether filtering is requested at all.
    pub enabled: bool,
    /// IP addresses or CIDR ranges to block.
    pub blocked_ips: Vec<String>,
    /// Client identifiers (peer-id prefixes or names) to block.
    pub blocked_clients: Vec<String>,
}

impl PeerFilterSettings {
    /// Whether the policy would block anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !(self.blocked_ips.is_empty() && self.blocked_clients.is_empty())
    }
}

/// Parameters for probing candidate media sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTestSettings {
    /// Run probes at all.
    pub enabled: bool,
    /// Deadline for each probe.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Bytes requested from each source.
    pub segment_size: u64,
}

impl Default for SpeedTestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_millis(defaults::SPEED_TEST_TIMEOUT_MS),
            segment_size: defaults::SPEED_TEST_SEGMENT_SIZE,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
