use std::time::Duration;

use anyhow::anyhow;
use siphon_engine::TorrentEngine;
use siphon_torrent_core::{TorrentDownloader, TorrentSession};
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::cli::{DownloadArgs, OutputFormat};
use crate::client::{CliContext, CliError, CliResult, start_engine};
use crate::output::{FileRow, SessionSummary, render_session, render_stats};

pub(crate) async fn handle_download(ctx: &CliContext, args: DownloadArgs) -> CliResult<()> {
    let handle = start_engine(&ctx.config)?;
    let outcome = follow_download(&handle.engine, &args, ctx.format).await;
    handle.engine.close().await;
    outcome
}

async fn follow_download(
    engine: &TorrentEngine,
    args: &DownloadArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let downloader = timeout(
        Duration::from_secs(args.init_timeout_secs),
        engine.downloader(),
    )
    .await
    .map_err(|_| {
        CliError::failure(anyhow!(
            "torrent engine did not initialize within {}s",
            args.init_timeout_secs
        ))
    })?
    .map_err(CliError::failure)?;

    let info = downloader
        .fetch_torrent(&args.uri, Duration::from_secs(args.fetch_timeout_secs))
        .await?;
    let session = downloader.start_download(&info).await?;

    let outcome = async {
        let summary = summarize(downloader.as_ref(), session.as_ref()).await?;
        render_session(&summary, format)?;
        watch_stats(session.as_ref(), args.watch_secs, format).await
    }
    .await;
    session.close().await;
    outcome
}

async fn summarize(
    downloader: &dyn TorrentDownloader,
    session: &dyn TorrentSession,
) -> CliResult<SessionSummary> {
    let name = session.name().await?;
    let files = match session.files().await {
        Ok(files) => files,
        Err(err) => {
            warn!(torrent = %session.handle(), error = %err, "file list not available yet");
            Vec::new()
        }
    };
    Ok(SessionSummary {
        handle: session.handle().to_string(),
        name,
        save_dir: downloader
            .save_dir_for(session.handle())
            .display()
            .to_string(),
        files: files
            .iter()
            .map(|file| FileRow {
                index: file.index(),
                path: file.path_in_torrent().to_string(),
                length: file.length(),
                resolved_path: file.resolved_path().display().to_string(),
                streaming: file.supports_streaming(),
            })
            .collect(),
    })
}

async fn watch_stats(
    session: &dyn TorrentSession,
    watch_secs: u64,
    format: OutputFormat,
) -> CliResult<()> {
    let mut stats = WatchStream::new(session.stats());
    let deadline = sleep(Duration::from_secs(watch_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return Ok(()),
            next = stats.next() => match next {
                Some(snapshot) => render_stats(&snapshot, format)?,
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use siphon_config::AppConfig;
    use siphon_test_support::fixtures::{
        SAMPLE_HASH, file_json, qbittorrent_config, sample_magnet, torrent_json,
    };
    use siphon_test_support::mocks;

    use super::*;

    fn context(base_url: &str) -> CliContext {
        CliContext {
            config: AppConfig {
                downloader: qbittorrent_config(base_url),
                ..AppConfig::default()
            },
            format: OutputFormat::Table,
        }
    }

    fn args(uri: String) -> DownloadArgs {
        DownloadArgs {
            uri,
            watch_secs: 0,
            fetch_timeout_secs: 5,
            init_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn magnet_download_reports_session() {
        let server = MockServer::start_async().await;
        mocks::login_ok(&server);
        let add = mocks::add_torrent(&server, "Ok.");
        mocks::torrents_info(&server, json!([torrent_json(SAMPLE_HASH, "demo", 4_096)]));
        mocks::torrent_files(
            &server,
            SAMPLE_HASH,
            json!([file_json(0, "demo/episode.mkv", 4_096, 0.25)]),
        );

        let outcome = handle_download(&context(&server.base_url()), args(sample_magnet())).await;

        assert!(outcome.is_ok());
        add.assert();
    }

    #[tokio::test]
    async fn unsupported_scheme_is_a_validation_error() {
        let server = MockServer::start_async().await;
        mocks::login_ok(&server);

        let err = handle_download(
            &context(&server.base_url()),
            args("ftp://mirror.example/a.torrent".into()),
        )
        .await
        .err();

        assert_eq!(err.map(|err| err.exit_code()), Some(2));
    }
}
