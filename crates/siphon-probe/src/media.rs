//! Candidate media and where their bytes live.

use serde::{Deserialize, Serialize};

/// Location of a media resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceLocation {
    /// Directly streamable HTTP file.
    HttpStreamingFile {
        /// File URL.
        uri: String,
    },
    /// `.torrent` file served over HTTP.
    HttpTorrentFile {
        /// File URL.
        uri: String,
    },
    /// Magnet link.
    MagnetLink {
        /// Magnet URI.
        uri: String,
    },
    /// File already on disk.
    LocalFile {
        /// Filesystem path.
        path: String,
    },
    /// Web page hosting a video player.
    WebVideo {
        /// Page URL.
        uri: String,
    },
}

impl ResourceLocation {
    /// URL a probe can fetch, if any. Magnet links and local files have none.
    #[must_use]
    pub fn probe_url(&self) -> Option<&str> {
        match self {
            Self::HttpStreamingFile { uri }
            | Self::HttpTorrentFile { uri }
            | Self::WebVideo { uri } => Some(uri),
            Self::MagnetLink { .. } | Self::LocalFile { .. } => None,
        }
    }
}

/// One candidate media item offered by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Identifier of this media item.
    pub media_id: String,
    /// Identifier of the source that offers it.
    pub source_id: String,
    /// Where the media can be fetched.
    pub download: ResourceLocation,
}

impl Media {
    /// Build a candidate.
    #[must_use]
    pub fn new(
        media_id: impl Into<String>,
        source_id: impl Into<String>,
        download: ResourceLocation,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            source_id: source_id.into(),
            download,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_locations_are_probeable() {
        let http = ResourceLocation::HttpStreamingFile {
            uri: "https://cdn.example/ep1.mp4".into(),
        };
        let web = ResourceLocation::WebVideo {
            uri: "https://video.example/watch".into(),
        };
        let magnet = ResourceLocation::MagnetLink {
            uri: "magnet:?xt=urn:btih:abc".into(),
        };
        let local = ResourceLocation::LocalFile {
            path: "/media/ep1.mkv".into(),
        };

        assert_eq!(http.probe_url(), Some("https://cdn.example/ep1.mp4"));
        assert_eq!(web.probe_url(), Some("https://video.example/watch"));
        assert_eq!(magnet.probe_url(), None);
        assert_eq!(local.probe_url(), None);
    }

    #[test]
    fn locations_are_tagged_by_kind() -> anyhow::Result<()> {
        let location: ResourceLocation = serde_json::from_value(serde_json::json!({
            "kind": "http_torrent_file",
            "uri": "https://tracker.example/a.torrent",
        }))?;
        assert_eq!(
            location,
            ResourceLocation::HttpTorrentFile {
                uri: "https://tracker.example/a.torrent".into()
            }
        );
        Ok(())
    }
}
