//! Authenticated client for the qBittorrent Web API v2.
//!
//! # Design
//! - The session cookie is explicit client state behind an `RwLock`; concurrent
//!   logins may race and the last writer wins.
//! - `ensure_logged_in` returns the cookie it guarantees, so authenticated calls
//!   cannot be issued without one.
//! - List and query calls are fail-soft: transport and shape failures yield empty
//!   or absent values and only credential rejection is surfaced.
//! - Control calls report success as a boolean and never propagate.

use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use siphon_config::QBittorrentSettings;
use siphon_torrent_core::TorrentHandle;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{QbError, QbResult};
use crate::types::{AddTorrentResponse, TorrentFileInfo, TorrentFilter, TorrentInfo, TransferInfo};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SESSION_COOKIE: &str = "SID=";
const TORRENT_UPLOAD_NAME: &str = "upload.torrent";

/// REST client bound to one qBittorrent daemon.
#[derive(Debug)]
pub struct QBittorrentClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    cookie: RwLock<Option<String>>,
}

impl QBittorrentClient {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the HTTP client cannot be built.
    pub fn new(settings: &QBittorrentSettings) -> QbResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!settings.verify_certificate)
            .build()
            .map_err(|source| QbError::ClientBuild { source })?;
        Self::with_http(http, settings)
    }

    /// Build a client around an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid.
    pub fn with_http(http: Client, settings: &QBittorrentSettings) -> QbResult<Self> {
        let mut base_url = Url::parse(settings.url.trim()).map_err(|source| QbError::InvalidUrl {
            url: settings.url.clone(),
            source,
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            username: settings.username.clone(),
            password: settings.password.clone(),
            cookie: RwLock::new(None),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authenticate and store a fresh session cookie.
    ///
    /// Safe to call while already logged in; the cookie is replaced.
    ///
    /// # Errors
    ///
    /// `Authentication` when the daemon sets no session cookie, `Transport` when
    /// the daemon is unreachable.
    pub async fn login(&self) -> QbResult<String> {
        const OPERATION: &str = "login";
        let response = self
            .http
            .post(self.endpoint("auth/login")?)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|source| QbError::Transport {
                operation: OPERATION,
                source,
            })?;

        let Some(cookie) = session_cookie(&response) else {
            warn!(status = %response.status(), "qBittorrent login rejected");
            return Err(QbError::Authentication {
                operation: OPERATION,
            });
        };
        *self.cookie.write().await = Some(cookie.clone());
        info!(url = %self.base_url, "logged in to qBittorrent");
        Ok(cookie)
    }

    /// Return the held cookie, logging in first when none is held.
    ///
    /// # Errors
    ///
    /// Propagates login failures.
    pub async fn ensure_logged_in(&self) -> QbResult<String> {
        if let Some(cookie) = self.cookie.read().await.clone() {
            return Ok(cookie);
        }
        self.login().await
    }

    /// Drop the held cookie so the next call logs in again.
    pub async fn forget_session(&self) {
        self.cookie.write().await.take();
    }

    /// Submit a magnet URI.
    ///
    /// # Errors
    ///
    /// Returns an error when login fails or the request cannot be completed; an
    /// unexpected body is reported as [`AddTorrentResponse::Rejected`].
    pub async fn add_magnet(
        &self,
        uri: &str,
        save_dir: Option<&str>,
    ) -> QbResult<AddTorrentResponse> {
        let mut form = Form::new().text("urls", uri.to_string());
        if let Some(dir) = save_dir {
            form = form.text("savepath", dir.to_string());
        }
        self.submit(form).await
    }

    /// Submit `.torrent` file bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_magnet`].
    pub async fn add_torrent_file(
        &self,
        bytes: Vec<u8>,
        save_dir: Option<&str>,
    ) -> QbResult<AddTorrentResponse> {
        let mut form = Form::new().part("torrents", Part::bytes(bytes).file_name(TORRENT_UPLOAD_NAME));
        if let Some(dir) = save_dir {
            form = form.text("savepath", dir.to_string());
        }
        self.submit(form).await
    }

    async fn submit(&self, form: Form) -> QbResult<AddTorrentResponse> {
        const OPERATION: &str = "add";
        let request = self.http.post(self.endpoint("torrents/add")?).multipart(form);
        let response = self.send_authenticated(OPERATION, request).await?;
        let body = response.text().await.map_err(|source| QbError::Transport {
            operation: OPERATION,
            source,
        })?;
        let outcome = AddTorrentResponse::from_body(&body);
        if let AddTorrentResponse::Rejected { body } = &outcome {
            warn!(body = %body, "qBittorrent did not acknowledge submission");
        }
        Ok(outcome)
    }

    /// List torrents, optionally narrowed by state filter and hashes.
    ///
    /// # Errors
    ///
    /// Only `Authentication`; every other failure yields an empty list.
    pub async fn get_torrents(
        &self,
        filter: Option<TorrentFilter>,
        hashes: &[TorrentHandle],
    ) -> QbResult<Vec<TorrentInfo>> {
        const OPERATION: &str = "torrents_info";
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = filter {
            query.push(("filter", filter.as_str().to_string()));
        }
        if !hashes.is_empty() {
            query.push(("hashes", join_hashes(hashes)));
        }
        let result = match self.endpoint("torrents/info") {
            Ok(url) => self.get_json(OPERATION, self.http.get(url).query(&query)).await,
            Err(err) => Err(err),
        };
        fail_soft(OPERATION, result, Vec::new)
    }

    /// List files of one torrent.
    ///
    /// # Errors
    ///
    /// Only `Authentication`; every other failure yields an empty list.
    pub async fn get_torrent_files(&self, hash: &TorrentHandle) -> QbResult<Vec<TorrentFileInfo>> {
        const OPERATION: &str = "torrents_files";
        let result = match self.endpoint("torrents/files") {
            Ok(url) => {
                let request = self.http.get(url).query(&[("hash", hash.as_str())]);
                self.get_json(OPERATION, request).await
            }
            Err(err) => Err(err),
        };
        fail_soft(OPERATION, result, Vec::new)
    }

    /// Global transfer counters; `None` on any failure.
    pub async fn get_transfer_info(&self) -> Option<TransferInfo> {
        const OPERATION: &str = "transfer_info";
        let url = self.endpoint("transfer/info").ok()?;
        match self.get_json(OPERATION, self.http.get(url)).await {
            Ok(info) => Some(info),
            Err(err) => {
                debug!(error = %err, "transfer info unavailable");
                None
            }
        }
    }

    /// Pause torrents; returns whether the daemon accepted the call.
    pub async fn pause_torrents(&self, hashes: &[TorrentHandle]) -> bool {
        self.control("pause", "torrents/pause", &[("hashes", join_hashes(hashes))])
            .await
    }

    /// Resume torrents; returns whether the daemon accepted the call.
    pub async fn resume_torrents(&self, hashes: &[TorrentHandle]) -> bool {
        self.control("resume", "torrents/resume", &[("hashes", join_hashes(hashes))])
            .await
    }

    /// Delete torrents, optionally with their data.
    pub async fn delete_torrents(&self, hashes: &[TorrentHandle], delete_files: bool) -> bool {
        self.control(
            "delete",
            "torrents/delete",
            &[
                ("hashes", join_hashes(hashes)),
                ("deleteFiles", delete_files.to_string()),
            ],
        )
        .await
    }

    /// Set the daemon priority of files inside one torrent.
    pub async fn set_file_priority(&self, hash: &TorrentHandle, ids: &[u32], priority: u8) -> bool {
        let ids = ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("|");
        self.control(
            "file_priority",
            "torrents/filePrio",
            &[
                ("hash", hash.as_str().to_string()),
                ("id", ids),
                ("priority", priority.to_string()),
            ],
        )
        .await
    }

    async fn control(&self, operation: &'static str, path: &str, query: &[(&str, String)]) -> bool {
        let request = match self.endpoint(path) {
            Ok(url) => self.http.post(url).query(query),
            Err(err) => {
                warn!(operation, error = %err, "qBittorrent control call failed");
                return false;
            }
        };
        match self.send_authenticated(operation, request).await {
            Ok(_) => true,
            Err(err) => {
                warn!(operation, error = %err, "qBittorrent control call failed");
                false
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> QbResult<T> {
        let response = self.send_authenticated(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| QbError::Decode { operation, source })
    }

    async fn send_authenticated(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> QbResult<Response> {
        let cookie = self.ensure_logged_in().await?;
        let response = request
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|source| QbError::Transport { operation, source })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            debug!(operation, "qBittorrent session expired; next call will log in again");
            self.forget_session().await;
        }
        if !status.is_success() {
            return Err(QbError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn endpoint(&self, path: &str) -> QbResult<Url> {
        self.base_url
            .join("api/v2/")
            .and_then(|api| api.join(path))
            .map_err(|source| QbError::InvalidUrl {
                url: self.base_url.to_string(),
                source,
            })
    }
}

fn session_cookie(response: &Response) -> Option<String> {
    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let chosen = cookies
        .iter()
        .find(|cookie| cookie.starts_with(SESSION_COOKIE))
        .or_else(|| cookies.first())?;
    let pair = chosen.split(';').next().unwrap_or_default().trim();
    (!pair.is_empty()).then(|| pair.to_string())
}

fn join_hashes(hashes: &[TorrentHandle]) -> String {
    hashes
        .iter()
        .map(TorrentHandle::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

fn fail_soft<T>(operation: &'static str, result: QbResult<T>, empty: fn() -> T) -> QbResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_authentication() => Err(err),
        Err(err) => {
            warn!(operation, error = %err, "qBittorrent query failed; returning empty result");
            Ok(empty())
        }
    }
}
