use std::time::Duration;

use anyhow::anyhow;
use reqwest::Client;
use siphon_probe::{Media, MediaSourceSpeedTester, ResourceLocation};

use crate::cli::ProbeArgs;
use crate::client::{CliContext, CliError, CliResult};
use crate::output::render_probe_report;

pub(crate) async fn handle_probe(ctx: &CliContext, args: ProbeArgs) -> CliResult<()> {
    let mut settings = ctx.config.speed_test.clone();
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(segment_size) = args.segment_size {
        settings.segment_size = segment_size;
    }

    let media: Vec<Media> = args
        .sources
        .iter()
        .map(|source| {
            Media::new(
                source.source_id.clone(),
                source.source_id.clone(),
                ResourceLocation::HttpStreamingFile {
                    uri: source.url.clone(),
                },
            )
        })
        .collect();
    let probed: Vec<String> = args
        .sources
        .into_iter()
        .map(|source| source.source_id)
        .collect();

    let http = Client::builder()
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
    let report = MediaSourceSpeedTester::new(http)
        .test_and_rank(&media, &settings)
        .await;
    render_probe_report(&report, &probed, ctx.format)
}
