use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use reqwest::Client;
use serde_json::json;
use siphon_qbittorrent::{DownloaderOptions, QBittorrentDownloader, ReqwestFileDownloader};
use siphon_test_support::fixtures::{
    SAMPLE_HASH, file_json, qbittorrent_settings, sample_magnet, torrent_json, transfer_json,
};
use siphon_test_support::mocks;
use siphon_torrent_core::{
    BoxError, DownloaderStats, EncodedTorrentInfo, FilePriority, HttpFileDownloader, TorrentDownloader,
    TorrentError, TorrentFileEntry, TorrentFileHandle, TorrentSession,
};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

const UNREACHABLE: &str = "http://127.0.0.1:1";
const NEW_HASH: &str = "fedcba9876543210fedcba9876543210fedcba98";

#[derive(Default)]
struct CountingFiles {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpFileDownloader for CountingFiles {
    async fn download(&self, _url: &str) -> Result<Vec<u8>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err("offline".into())
    }
}

struct SlowFiles;

#[async_trait]
impl HttpFileDownloader for SlowFiles {
    async fn download(&self, _url: &str) -> Result<Vec<u8>, BoxError> {
        sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }
}

fn fast_options() -> DownloaderOptions {
    DownloaderOptions {
        poll_interval: Duration::from_millis(25),
        discovery_attempts: 20,
        discovery_interval: Duration::from_millis(20),
    }
}

fn downloader(
    base_url: &str,
    files: Arc<dyn HttpFileDownloader>,
    options: DownloaderOptions,
) -> anyhow::Result<QBittorrentDownloader> {
    Ok(QBittorrentDownloader::new(
        &qbittorrent_settings(base_url),
        files,
        options,
    )?)
}

#[tokio::test]
async fn magnet_fetch_is_local_and_verbatim() -> anyhow::Result<()> {
    let files = Arc::new(CountingFiles::default());
    let downloader = downloader(UNREACHABLE, files.clone(), fast_options())?;

    let magnet = sample_magnet();
    let info = downloader
        .fetch_torrent(&magnet, Duration::from_secs(1))
        .await?;

    assert_eq!(info.as_bytes(), magnet.as_bytes());
    assert_eq!(files.calls.load(Ordering::SeqCst), 0);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn unsupported_schemes_are_rejected() -> anyhow::Result<()> {
    let files = Arc::new(CountingFiles::default());
    let downloader = downloader(UNREACHABLE, files.clone(), fast_options())?;

    for uri in [
        "ftp://example.com/a.torrent",
        "file:///tmp/a.torrent",
        "MAGNET:?xt=urn:btih:abc",
        "",
        "/tmp/a.torrent",
    ] {
        let result = downloader.fetch_torrent(uri, Duration::from_secs(1)).await;
        assert!(
            matches!(result, Err(TorrentError::UnsupportedUri { .. })),
            "{uri} should be rejected"
        );
    }
    assert_eq!(files.calls.load(Ordering::SeqCst), 0);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn http_fetch_distinguishes_failure_from_timeout() -> anyhow::Result<()> {
    let failing = downloader(UNREACHABLE, Arc::new(CountingFiles::default()), fast_options())?;
    let result = failing
        .fetch_torrent("https://example.com/a.torrent", Duration::from_secs(1))
        .await;
    assert!(matches!(
        result,
        Err(TorrentError::MetadataFetchFailed { .. })
    ));

    let slow = downloader(UNREACHABLE, Arc::new(SlowFiles), fast_options())?;
    let result = slow
        .fetch_torrent("http://example.com/a.torrent", Duration::from_millis(50))
        .await;
    assert!(matches!(result, Err(TorrentError::FetchTimeout { .. })));

    failing.close().await;
    slow.close().await;
    Ok(())
}

#[tokio::test]
async fn http_fetch_downloads_metainfo_bytes() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/files/demo.torrent");
        then.status(200).body("d4:infod4:name4:demoee");
    });

    let files = Arc::new(ReqwestFileDownloader::new(Client::new()));
    let downloader = downloader(UNREACHABLE, files, fast_options())?;
    let info = downloader
        .fetch_torrent(&server.url("/files/demo.torrent"), Duration::from_secs(2))
        .await?;

    assert!(!info.is_magnet());
    assert_eq!(info.as_bytes(), b"d4:infod4:name4:demoee");
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn start_download_opens_session_for_magnet_hash() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    let add = mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(
        &server,
        json!([
            torrent_json("aaaa", "bigger unrelated", 9_999_999),
            torrent_json(SAMPLE_HASH, "demo", 4_096),
        ]),
    );

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    add.assert();
    assert_eq!(session.handle().as_str(), SAMPLE_HASH);
    assert_eq!(session.name().await?, "demo");
    assert_eq!(downloader.open_sessions().await, vec![session.handle().clone()]);
    assert_eq!(
        downloader.save_dir_for(session.handle()),
        std::path::PathBuf::from("/downloads")
    );
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn start_download_waits_for_torrent_to_appear() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    let mut empty = mocks::torrents_info(&server, json!([]));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let info = EncodedTorrentInfo::new(b"d4:infod4:name4:demoee".to_vec());

    let (result, ()) = tokio::join!(downloader.start_download(&info), async {
        sleep(Duration::from_millis(80)).await;
        empty.delete();
        mocks::torrents_info(&server, json!([torrent_json(NEW_HASH, "late", 100)]));
    });

    let session = result?;
    assert_eq!(session.handle().as_str(), NEW_HASH);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn start_download_gives_up_after_bounded_attempts() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    let listing = mocks::torrents_info(&server, json!([torrent_json("aaaa", "pre-existing", 10)]));

    let options = DownloaderOptions {
        discovery_attempts: 3,
        discovery_interval: Duration::from_millis(10),
        ..fast_options()
    };
    let downloader = downloader(&server.base_url(), Arc::new(CountingFiles::default()), options)?;

    let result = timeout(
        Duration::from_secs(5),
        downloader.start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet())),
    )
    .await?;

    match result {
        Err(TorrentError::NotFound { handle, .. }) => {
            assert_eq!(handle.map(|h| h.to_string()).as_deref(), Some(SAMPLE_HASH));
        }
        Err(other) => panic!("expected not found, got {other:?}"),
        Ok(_) => panic!("expected not found, got a session"),
    }
    // One snapshot before submitting, then one listing per attempt.
    assert_eq!(listing.hits(), 4);
    assert!(downloader.open_sessions().await.is_empty());
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn rejected_submission_is_typed() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Fails.");
    mocks::torrents_info(&server, json!([]));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let result = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await;
    assert!(matches!(
        result,
        Err(TorrentError::SubmissionRejected { .. })
    ));
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_fail_start_download() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_rejected(&server);

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let result = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await;
    assert!(matches!(result, Err(TorrentError::Authentication { .. })));
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn aggregate_stats_follow_transfer_info() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::transfer_info(&server, transfer_json(2_048, 10_000, 512, 700));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let mut stats = downloader.stats();
    let snapshot = timeout(
        Duration::from_secs(2),
        stats.wait_for(|stats| stats.updated_at.is_some()),
    )
    .await??
    .clone();

    assert_eq!(snapshot.download_speed, 2_048);
    assert_eq!(snapshot.downloaded_bytes, 10_000);
    assert_eq!(snapshot.upload_speed, 512);
    assert_eq!(snapshot.uploaded_bytes, 700);
    assert_eq!(downloader.vendor().vendor, "qBittorrent");
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn session_files_are_cached_after_first_fetch() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 3_000)]));
    let mut first_listing = mocks::torrent_files(
        &server,
        SAMPLE_HASH,
        json!([
            file_json(0, "demo/ep1.mkv", 1_000, 0.5),
            file_json(1, "demo/ep2.mkv", 2_000, 0.0),
        ]),
    );

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    let first: Vec<(String, u64)> = session
        .files()
        .await?
        .iter()
        .map(|file| (file.path_in_torrent().to_string(), file.length()))
        .collect();

    first_listing.delete();
    mocks::torrent_files(
        &server,
        SAMPLE_HASH,
        json!([file_json(0, "renamed.mkv", 1, 1.0)]),
    );

    let second = session.files().await?;
    let second: Vec<(String, u64)> = second
        .iter()
        .map(|file| (file.path_in_torrent().to_string(), file.length()))
        .collect();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            ("demo/ep1.mkv".to_string(), 1_000),
            ("demo/ep2.mkv".to_string(), 2_000)
        ]
    );

    let entries = session.files().await?;
    assert_eq!(
        entries[0].resolved_path(),
        std::path::PathBuf::from("/downloads/demo/ep1.mkv")
    );
    assert!(entries[0].supports_streaming());
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn file_handles_track_stats_and_priority() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 3_000)]));
    mocks::torrent_files(
        &server,
        SAMPLE_HASH,
        json!([file_json(0, "demo/ep1.mkv", 1_000, 0.5)]),
    );
    let priority = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/torrents/filePrio")
            .query_param("hash", SAMPLE_HASH)
            .query_param("id", "0")
            .query_param("priority", "0");
        then.status(200);
    });

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;
    let entries = session.files().await?;
    let handle = entries[0].open().await?;

    assert!(!session.close_if_not_in_use().await);
    assert_eq!(handle.priority(), FilePriority::Normal);
    handle.set_priority(FilePriority::Skip).await?;
    priority.assert();
    assert_eq!(handle.priority(), FilePriority::Skip);

    let stats = *handle.stats().borrow();
    assert_eq!(stats.downloaded_bytes, 500);

    handle.close().await;
    assert!(session.close_if_not_in_use().await);
    assert!(matches!(
        session.name().await,
        Err(TorrentError::Closed { .. })
    ));
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn close_tears_down_sessions_and_rejects_new_work() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 3_000)]));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    timeout(Duration::from_secs(2), downloader.close()).await?;

    assert!(downloader.open_sessions().await.is_empty());
    assert!(matches!(
        session.files().await,
        Err(TorrentError::Closed { .. })
    ));
    assert!(matches!(
        downloader
            .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
            .await,
        Err(TorrentError::Closed { .. })
    ));
    Ok(())
}

async fn wait_for_hits(mock: &httpmock::Mock<'_>, hits: usize) -> anyhow::Result<()> {
    timeout(WAIT, async {
        while mock.hits() < hits {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn session_stats_keep_last_value_when_torrent_disappears() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    let mut listing = mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 4_000)]));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    listing.delete();
    let mut row = torrent_json(SAMPLE_HASH, "demo", 4_000);
    row["progress"] = json!(0.75);
    row["downloaded"] = json!(3_000);
    let mut listing = mocks::torrents_info(&server, json!([row]));

    let mut stats = session.stats();
    let updated = timeout(WAIT, stats.wait_for(|stats| stats.downloaded_bytes == 3_000))
        .await??
        .clone();
    assert!((updated.progress - 0.75).abs() < f32::EPSILON);

    listing.delete();
    let missing = mocks::torrents_info(&server, json!([]));
    wait_for_hits(&missing, 3).await?;

    let after = session.stats().borrow().clone();
    assert_eq!(after.downloaded_bytes, 3_000);
    assert!((after.progress - 0.75).abs() < f32::EPSILON);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn aggregate_stats_stay_stale_when_transfer_info_fails() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    let mut transfer = mocks::transfer_info(&server, transfer_json(2_048, 10_000, 512, 700));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let mut stats = downloader.stats();
    timeout(WAIT, stats.wait_for(|stats| stats.updated_at.is_some())).await??;

    transfer.delete();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/api/v2/transfer/info");
        then.status(500);
    });
    wait_for_hits(&failing, 1).await?;
    let last_good: DownloaderStats = *downloader.stats().borrow();
    wait_for_hits(&failing, 4).await?;

    assert_eq!(*downloader.stats().borrow(), last_good);
    assert_eq!(last_good.download_speed, 2_048);
    assert_eq!(last_good.downloaded_bytes, 10_000);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn aggregate_stats_fold_in_tracked_sessions() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 4_000)]));
    mocks::transfer_info(&server, transfer_json(2_048, 1_000, 0, 0));

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    let mut stats = downloader.stats();
    let snapshot = *timeout(WAIT, stats.wait_for(|stats| stats.total_size == 4_000)).await??;
    assert!((snapshot.progress - 0.25).abs() < f32::EPSILON);
    assert_eq!(snapshot.downloaded_bytes, 1_000);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn closed_sessions_are_released_by_the_downloader() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    mocks::torrents_info(
        &server,
        json!([
            torrent_json(SAMPLE_HASH, "demo", 4_000),
            torrent_json(NEW_HASH, "other", 1_000),
        ]),
    );

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let first = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;
    first.close().await;

    let second = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&format!(
            "magnet:?xt=urn:btih:{NEW_HASH}"
        )))
        .await?;

    assert_eq!(Arc::strong_count(&first), 1);
    assert_eq!(downloader.open_sessions().await, vec![second.handle().clone()]);
    downloader.close().await;
    Ok(())
}

#[tokio::test]
async fn close_during_discovery_never_leaks_a_session() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    server.mock(|when, then| {
        when.method(GET).path("/api/v2/torrents/info");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([torrent_json(SAMPLE_HASH, "demo", 4_000)]))
            .delay(Duration::from_millis(400));
    });

    let downloader = downloader(
        &server.base_url(),
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let info = EncodedTorrentInfo::from_magnet(&sample_magnet());

    // Snapshot ends near 400ms, so the discovery listing is in flight at 600ms.
    let (result, ()) = tokio::join!(downloader.start_download(&info), async {
        sleep(Duration::from_millis(600)).await;
        downloader.close().await;
    });

    assert!(matches!(result, Err(TorrentError::Closed { .. })));
    assert!(downloader.open_sessions().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn save_dir_falls_back_to_daemon_path_per_session() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    mocks::add_torrent(&server, "Ok.");
    let mut row = torrent_json(SAMPLE_HASH, "demo", 4_000);
    row["save_path"] = json!("/srv/media");
    mocks::torrents_info(&server, json!([row]));

    let settings = siphon_config::QBittorrentSettings {
        save_dir: String::new(),
        ..qbittorrent_settings(&server.base_url())
    };
    let downloader = QBittorrentDownloader::new(
        &settings,
        Arc::new(CountingFiles::default()),
        fast_options(),
    )?;
    let session = downloader
        .start_download(&EncodedTorrentInfo::from_magnet(&sample_magnet()))
        .await?;

    assert_eq!(
        downloader.save_dir_for(session.handle()),
        std::path::PathBuf::from("/srv/media")
    );
    assert_eq!(
        downloader.save_dir_for(&siphon_torrent_core::TorrentHandle::new(NEW_HASH)),
        std::path::PathBuf::new()
    );
    assert!(downloader.list_saves().is_empty());
    downloader.close().await;
    Ok(())
}
