use siphon_config::TorrentDownloaderType;
use siphon_qbittorrent::QBittorrentClient;

use crate::cli::TorrentsArgs;
use crate::client::{CliContext, CliError, CliResult};
use crate::output::render_torrent_list;

pub(crate) async fn handle_torrents(ctx: &CliContext, args: TorrentsArgs) -> CliResult<()> {
    if ctx.config.downloader.downloader_type != TorrentDownloaderType::QBittorrent {
        return Err(CliError::validation(
            "listing torrents requires the qbittorrent backend",
        ));
    }
    let client = QBittorrentClient::new(&ctx.config.downloader.qbittorrent)
        .map_err(CliError::failure)?;
    let torrents = client
        .get_torrents(args.filter.map(Into::into), &[])
        .await
        .map_err(|err| {
            CliError::failure(anyhow::Error::new(err).context("failed to list qBittorrent torrents"))
        })?;
    render_torrent_list(&torrents, ctx.format)
}
