//! Route helpers that turn an `httpmock` server into a fake qBittorrent daemon.

use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::Value;

/// Cookie pair issued by [`login_ok`].
pub const SESSION_COOKIE: &str = "SID=test-session";

/// Accept any credentials and issue [`SESSION_COOKIE`].
pub fn login_ok(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/auth/login");
        then.status(200)
            .header("set-cookie", format!("{SESSION_COOKIE}; HttpOnly; path=/"))
            .body("Ok.");
    })
}

/// Reject credentials the way the daemon does: `200 Fails.` without a cookie.
pub fn login_rejected(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/auth/login");
        then.status(200).body("Fails.");
    })
}

/// Answer submissions with `body`.
pub fn add_torrent<'a>(server: &'a MockServer, body: &str) -> Mock<'a> {
    let body = body.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path("/api/v2/torrents/add")
            .header("cookie", SESSION_COOKIE);
        then.status(200).body(body);
    })
}

/// Serve `torrents` from `torrents/info` regardless of query.
pub fn torrents_info(server: &MockServer, torrents: Value) -> Mock<'_> {
    server.mock(move |when, then| {
        when.method(GET)
            .path("/api/v2/torrents/info")
            .header("cookie", SESSION_COOKIE);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(torrents);
    })
}

/// Serve `files` from `torrents/files` for `hash`.
pub fn torrent_files<'a>(server: &'a MockServer, hash: &str, files: Value) -> Mock<'a> {
    let hash = hash.to_string();
    server.mock(move |when, then| {
        when.method(GET)
            .path("/api/v2/torrents/files")
            .query_param("hash", hash)
            .header("cookie", SESSION_COOKIE);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(files);
    })
}

/// Serve `body` from `transfer/info`.
pub fn transfer_info(server: &MockServer, body: Value) -> Mock<'_> {
    server.mock(move |when, then| {
        when.method(GET)
            .path("/api/v2/transfer/info")
            .header("cookie", SESSION_COOKIE);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    })
}

/// Accept a control call (`pause`, `resume`, `delete`, `filePrio`) for `hashes`.
pub fn control<'a>(
    server: &'a MockServer,
    action: &str,
    hash_param: &str,
    hashes: &str,
) -> Mock<'a> {
    let path = format!("/api/v2/torrents/{action}");
    let hash_param = hash_param.to_string();
    let hashes = hashes.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path(path)
            .query_param(hash_param, hashes)
            .header("cookie", SESSION_COOKIE);
        then.status(200);
    })
}
