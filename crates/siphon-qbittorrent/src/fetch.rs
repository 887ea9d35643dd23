//! HTTP download of `.torrent` files.

use async_trait::async_trait;
use reqwest::Client;
use siphon_torrent_core::{BoxError, HttpFileDownloader};

/// [`HttpFileDownloader`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFileDownloader {
    http: Client,
}

impl ReqwestFileDownloader {
    /// Wrap an existing client.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpFileDownloader for ReqwestFileDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
